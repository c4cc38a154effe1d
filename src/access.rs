// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access rules for protected records.
//!
//! Each rule is a pure function of the authenticated principal (and, for
//! record checks, the target ID). A rule either denies, grants full access,
//! or grants access scoped by an equality filter on the stored records.

use crate::db::{Filter, Record, RecordId};
use crate::middleware::auth::AuthUser;
use crate::models::UserType;

/// Result of an access rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Denied,
    Full,
    Scoped(Filter),
}

impl Access {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Access::Full
        } else {
            Access::Denied
        }
    }

    /// True unless the rule denied outright.
    pub fn allows(&self) -> bool {
        !matches!(self, Access::Denied)
    }

    /// True if `record` is visible under this rule.
    pub fn permits_record<R: Record>(&self, record: &R) -> bool {
        match self {
            Access::Denied => false,
            Access::Full => true,
            Access::Scoped(filter) => filter.matches_record(record),
        }
    }

    /// Store filters implementing this rule, or `None` when denied.
    pub fn filters(&self) -> Option<Vec<Filter>> {
        match self {
            Access::Denied => None,
            Access::Full => Some(Vec::new()),
            Access::Scoped(filter) => Some(vec![filter.clone()]),
        }
    }
}

fn user_type(user: Option<&AuthUser>) -> Option<UserType> {
    user.map(|u| u.user_type)
}

/// Any clinic or platform staff member.
pub fn is_staff(user: Option<&AuthUser>) -> Access {
    Access::from_bool(matches!(
        user_type(user),
        Some(UserType::Clinic | UserType::Platform)
    ))
}

pub fn is_clinic_staff(user: Option<&AuthUser>) -> Access {
    Access::from_bool(user_type(user) == Some(UserType::Clinic))
}

pub fn is_platform_staff(user: Option<&AuthUser>) -> Access {
    Access::from_bool(user_type(user) == Some(UserType::Platform))
}

pub fn is_patient(user: Option<&AuthUser>) -> Access {
    Access::from_bool(user_type(user) == Some(UserType::Patient))
}

/// Clinic staff see only the profile linked to their own BasicUser.
pub fn is_own_clinic_staff_profile(user: Option<&AuthUser>) -> Access {
    match user {
        Some(u) if u.user_type == UserType::Clinic => Access::Scoped(Filter::id("user", u.id)),
        _ => Access::Denied,
    }
}

/// Platform staff see everything; clinic staff only their own BasicUser row.
pub fn is_platform_staff_or_self(user: Option<&AuthUser>) -> Access {
    match user {
        Some(u) if u.user_type == UserType::Platform => Access::Full,
        Some(u) if u.user_type == UserType::Clinic => Access::Scoped(Filter::id("id", u.id)),
        _ => Access::Denied,
    }
}

/// A patient acting on their own Patient record.
///
/// Without a target ID this scopes the collection to the caller's row.
pub fn is_own_patient(user: Option<&AuthUser>, target: Option<RecordId>) -> Access {
    match user {
        Some(u) if u.user_type == UserType::Patient => match target {
            Some(id) => Access::from_bool(id == u.id),
            None => Access::Scoped(Filter::id("id", u.id)),
        },
        _ => Access::Denied,
    }
}

/// Platform staff see everything; clinic staff only records of their assigned
/// clinic. Clinic staff without an assignment see nothing.
pub fn platform_or_own_clinic_resource(user: Option<&AuthUser>) -> Access {
    match user {
        Some(u) if u.user_type == UserType::Platform => Access::Full,
        Some(u) if u.user_type == UserType::Clinic => match u.clinic_id {
            Some(clinic) => Access::Scoped(Filter::id("clinic", clinic)),
            None => Access::Denied,
        },
        _ => Access::Denied,
    }
}

/// Platform staff see everything; patients only records whose `field` names
/// them (`"id"` for the patients collection itself).
pub fn platform_or_own_patient_resource(user: Option<&AuthUser>, field: &'static str) -> Access {
    match user {
        Some(u) if u.user_type == UserType::Platform => Access::Full,
        Some(u) if u.user_type == UserType::Patient => Access::Scoped(Filter::id(field, u.id)),
        _ => Access::Denied,
    }
}

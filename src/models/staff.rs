//! Staff profile records.
//!
//! Each profile references exactly one BasicUser through `user`. The relation
//! is unique and frozen after creation.

use serde::{Deserialize, Serialize};

use crate::db::{collections, Record, RecordId, UniqueKey};

/// Approval state of a clinic staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClinicStaffStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Clinic staff profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicStaff {
    #[serde(default)]
    pub id: RecordId,
    /// BasicUser this profile belongs to
    pub user: RecordId,
    pub first_name: String,
    pub last_name: String,
    /// Contact email (copied from the BasicUser)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: ClinicStaffStatus,
    /// Assigned clinic, once a platform admin links one
    #[serde(default)]
    pub clinic: Option<RecordId>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for ClinicStaff {
    const COLLECTION: &'static str = collections::CLINIC_STAFF;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("user", &self.user.to_string())]
    }
}

/// Role of a platform staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformRole {
    Admin,
    #[default]
    Support,
    ContentManager,
}

/// Platform staff profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStaff {
    #[serde(default)]
    pub id: RecordId,
    pub user: RecordId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: PlatformRole,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for PlatformStaff {
    const COLLECTION: &'static str = collections::PLATFORM_STAFF;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("user", &self.user.to_string())]
    }
}

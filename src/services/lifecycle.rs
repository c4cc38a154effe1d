// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Staff and patient account lifecycle.
//!
//! Keeps identity records and local records in step:
//! - creating a BasicUser provisions its identity (when it has none) and its
//!   role profile
//! - deleting a BasicUser removes its profiles and its identity
//! - deleting a staff profile removes the identity and the BasicUser
//! - deleting a Patient removes its identity
//!
//! Identity cleanup is best-effort everywhere: failures are logged and the
//! local deletion still happens.

use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;

use crate::db::{Db, Filter, Record, RecordId};
use crate::error::AppError;
use crate::models::{
    BasicUser, ClinicStaff, ClinicStaffStatus, Patient, PlatformRole, PlatformStaff, StaffType,
};
use crate::services::supabase::{CreateUserRequest, IdentityUser, SupabaseAuthClient};
use crate::time_utils::now_rfc3339;

/// Length of generated temporary passwords.
pub const TEMP_PASSWORD_LEN: usize = 12;

const TEMP_PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Profiles looked up per collection when cascading a BasicUser deletion.
const CASCADE_LIMIT: u32 = 10;

/// Generate a random temporary password.
pub fn generate_temp_password() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let charset_len = TEMP_PASSWORD_CHARSET.len();
    // Largest multiple of the charset size that fits in a byte, to avoid bias.
    let limit = (256 / charset_len) * charset_len;

    let mut password = String::with_capacity(TEMP_PASSWORD_LEN);
    let mut buf = [0u8; 32];
    while password.len() < TEMP_PASSWORD_LEN {
        rng.fill(&mut buf)
            .map_err(|_| anyhow::anyhow!("Failed to generate temporary password"))?;
        for &b in buf.iter() {
            if (b as usize) < limit && password.len() < TEMP_PASSWORD_LEN {
                password.push(TEMP_PASSWORD_CHARSET[b as usize % charset_len] as char);
            }
        }
    }
    Ok(password)
}

/// Role-specific profile attached to a BasicUser.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StaffProfile {
    Clinic(ClinicStaff),
    Platform(PlatformStaff),
}

impl StaffProfile {
    pub fn id(&self) -> RecordId {
        match self {
            StaffProfile::Clinic(p) => p.id,
            StaffProfile::Platform(p) => p.id,
        }
    }
}

/// Values used to create a staff profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileSeed {
    pub first_name: String,
    pub last_name: String,
    /// Platform role; defaults to admin
    pub role: Option<PlatformRole>,
    /// Clinic assignment for clinic staff
    pub clinic: Option<RecordId>,
}

/// Input for [`UserLifecycle::create_basic_user`].
#[derive(Debug, Clone)]
pub struct NewBasicUser {
    pub email: String,
    /// Required when no identity exists yet
    pub password: Option<String>,
    pub supabase_user_id: Option<String>,
    pub user_type: StaffType,
    pub first_name: String,
    pub last_name: String,
}

/// Input for [`UserLifecycle::create_staff_with_account`].
#[derive(Debug, Clone)]
pub struct NewStaffAccount {
    pub email: String,
    pub user_type: StaffType,
    pub seed: ProfileSeed,
}

/// Result of creating a staff member together with their login.
#[derive(Debug, Clone)]
pub struct StaffAccount {
    pub basic_user: BasicUser,
    pub profile: StaffProfile,
    /// Shown once to the creating admin; never stored
    pub temporary_password: String,
}

#[derive(Clone)]
pub struct UserLifecycle {
    db: Db,
    identity: SupabaseAuthClient,
}

impl UserLifecycle {
    pub fn new(db: Db, identity: SupabaseAuthClient) -> Self {
        Self { db, identity }
    }

    // ─── Creation ────────────────────────────────────────────────

    /// Create a BasicUser and its profile.
    ///
    /// Provisions the identity record first when `supabase_user_id` is unset;
    /// failure aborts creation. A failed profile creation is logged and does
    /// not undo the BasicUser.
    pub async fn create_basic_user(&self, new: NewBasicUser) -> Result<BasicUser, AppError> {
        let (supabase_user_id, provisioned) = match new.supabase_user_id.clone() {
            Some(id) => {
                tracing::info!(supabase_user_id = %id, "BasicUser creation with existing identity");
                (id, false)
            }
            None => {
                let password = new.password.as_deref().ok_or_else(|| {
                    AppError::BadRequest("Password is required to create a BasicUser".to_string())
                })?;
                let identity = self
                    .identity
                    .create_user(&CreateUserRequest::tagged(
                        &new.email,
                        password,
                        new.user_type.into(),
                        &new.first_name,
                        &new.last_name,
                    ))
                    .await
                    .inspect_err(|e| {
                        tracing::error!(email = %new.email, error = %e, "Identity provisioning failed");
                    })?;
                (identity.id, true)
            }
        };

        let basic_user = match self
            .store_basic_user(&new.email, &supabase_user_id, new.user_type, &new.first_name, &new.last_name)
            .await
        {
            Ok(user) => user,
            Err(e) => {
                if provisioned {
                    self.discard_identity(&supabase_user_id).await;
                }
                return Err(e);
            }
        };

        let seed = ProfileSeed {
            first_name: new.first_name,
            last_name: new.last_name,
            ..Default::default()
        };
        if let Err(e) = self.ensure_profile(&basic_user, &seed).await {
            tracing::error!(
                basic_user_id = basic_user.id,
                error = %e,
                "Failed to create staff profile for BasicUser"
            );
        }

        Ok(basic_user)
    }

    async fn store_basic_user(
        &self,
        email: &str,
        supabase_user_id: &str,
        user_type: StaffType,
        first_name: &str,
        last_name: &str,
    ) -> Result<BasicUser, AppError> {
        let now = now_rfc3339();
        self.db
            .create(BasicUser {
                id: 0,
                email: email.trim().to_string(),
                supabase_user_id: Some(supabase_user_id.to_string()),
                user_type,
                first_name: Some(first_name.to_string()).filter(|s| !s.is_empty()),
                last_name: Some(last_name.to_string()).filter(|s| !s.is_empty()),
                created_at: now.clone(),
                updated_at: now,
            })
            .await
    }

    /// Find the profile linked to `basic_user`, if any.
    pub async fn find_profile(&self, basic_user: &BasicUser) -> Result<Option<StaffProfile>, AppError> {
        let by_user = [Filter::id("user", basic_user.id)];
        Ok(match basic_user.user_type {
            StaffType::Clinic => self
                .db
                .find_one::<ClinicStaff>(&by_user)
                .await?
                .map(StaffProfile::Clinic),
            StaffType::Platform => self
                .db
                .find_one::<PlatformStaff>(&by_user)
                .await?
                .map(StaffProfile::Platform),
        })
    }

    /// Create the profile matching the BasicUser's type.
    pub async fn create_profile(
        &self,
        basic_user: &BasicUser,
        seed: &ProfileSeed,
    ) -> Result<StaffProfile, AppError> {
        let now = now_rfc3339();
        let profile = match basic_user.user_type {
            StaffType::Clinic => StaffProfile::Clinic(
                self.db
                    .create(ClinicStaff {
                        id: 0,
                        user: basic_user.id,
                        first_name: seed.first_name.clone(),
                        last_name: seed.last_name.clone(),
                        email: Some(basic_user.email.clone()),
                        status: ClinicStaffStatus::Pending,
                        clinic: seed.clinic,
                        created_at: now.clone(),
                        updated_at: now,
                    })
                    .await?,
            ),
            StaffType::Platform => StaffProfile::Platform(
                self.db
                    .create(PlatformStaff {
                        id: 0,
                        user: basic_user.id,
                        first_name: seed.first_name.clone(),
                        last_name: seed.last_name.clone(),
                        role: seed.role.unwrap_or(PlatformRole::Admin),
                        created_at: now.clone(),
                        updated_at: now,
                    })
                    .await?,
            ),
        };

        tracing::info!(
            basic_user_id = basic_user.id,
            profile_id = profile.id(),
            user_type = ?basic_user.user_type,
            "Staff profile created"
        );
        Ok(profile)
    }

    /// Create the profile unless one already exists.
    pub async fn ensure_profile(
        &self,
        basic_user: &BasicUser,
        seed: &ProfileSeed,
    ) -> Result<StaffProfile, AppError> {
        if let Some(existing) = self.find_profile(basic_user).await? {
            tracing::debug!(basic_user_id = basic_user.id, "Staff profile already exists");
            return Ok(existing);
        }
        self.create_profile(basic_user, seed).await
    }

    /// Create a BasicUser and profile for an existing identity record.
    ///
    /// If the profile cannot be created the BasicUser is removed again; the
    /// caller owns cleanup of the identity record.
    pub async fn provision_staff(
        &self,
        identity: &IdentityUser,
        email: &str,
        user_type: StaffType,
        seed: &ProfileSeed,
    ) -> Result<(BasicUser, StaffProfile), AppError> {
        let basic_user = self
            .store_basic_user(email, &identity.id, user_type, &seed.first_name, &seed.last_name)
            .await?;

        match self.create_profile(&basic_user, seed).await {
            Ok(profile) => Ok((basic_user, profile)),
            Err(e) => {
                if let Err(cleanup) = self.db.delete::<BasicUser>(basic_user.id).await {
                    tracing::error!(
                        basic_user_id = basic_user.id,
                        error = %cleanup,
                        "Failed to remove BasicUser after profile creation failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Create a staff member with a fresh login and temporary password.
    pub async fn create_staff_with_account(
        &self,
        new: NewStaffAccount,
    ) -> Result<StaffAccount, AppError> {
        let temporary_password = generate_temp_password()?;

        let identity = self
            .identity
            .create_user(&CreateUserRequest::tagged(
                &new.email,
                &temporary_password,
                new.user_type.into(),
                &new.seed.first_name,
                &new.seed.last_name,
            ))
            .await?;

        match self
            .provision_staff(&identity, &new.email, new.user_type, &new.seed)
            .await
        {
            Ok((basic_user, profile)) => {
                tracing::info!(
                    basic_user_id = basic_user.id,
                    supabase_user_id = %identity.id,
                    "Created staff account with temporary password"
                );
                Ok(StaffAccount {
                    basic_user,
                    profile,
                    temporary_password,
                })
            }
            Err(e) => {
                self.discard_identity(&identity.id).await;
                Err(e)
            }
        }
    }

    // ─── Deletion ────────────────────────────────────────────────

    /// Best-effort delete of an identity record. Never fails.
    pub async fn discard_identity(&self, supabase_user_id: &str) {
        match self.identity.delete_user(supabase_user_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!(supabase_user_id = %supabase_user_id, "Identity record already deleted");
            }
            Err(e) => {
                tracing::error!(
                    supabase_user_id = %supabase_user_id,
                    error = %e,
                    "Failed to delete identity record"
                );
            }
        }
    }

    async fn delete_profiles_of<R: Record>(&self, basic_user_id: RecordId) {
        let profiles: Vec<R> = match self
            .db
            .find(&[Filter::id("user", basic_user_id)], CASCADE_LIMIT)
            .await
        {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::error!(
                    basic_user_id,
                    collection = R::COLLECTION,
                    error = %e,
                    "Failed to look up profiles for cascade"
                );
                return;
            }
        };

        for profile in profiles {
            if let Err(e) = self.db.delete::<R>(profile.id()).await {
                tracing::error!(
                    basic_user_id,
                    collection = R::COLLECTION,
                    profile_id = profile.id(),
                    error = %e,
                    "Failed to delete profile during cascade"
                );
            }
        }
    }

    /// Delete a BasicUser, its profiles and its identity record.
    ///
    /// Returns `None` if the BasicUser does not exist.
    pub async fn delete_basic_user(&self, id: RecordId) -> Result<Option<BasicUser>, AppError> {
        let Some(basic_user) = self.db.find_by_id::<BasicUser>(id).await? else {
            return Ok(None);
        };

        futures_util::join!(
            self.delete_profiles_of::<ClinicStaff>(id),
            self.delete_profiles_of::<PlatformStaff>(id),
        );

        match &basic_user.supabase_user_id {
            Some(supabase_user_id) => self.discard_identity(supabase_user_id).await,
            None => tracing::warn!(basic_user_id = id, "BasicUser has no identity record"),
        }

        self.db.delete::<BasicUser>(id).await?;
        tracing::info!(basic_user_id = id, "BasicUser deleted with profiles");
        Ok(Some(basic_user))
    }

    /// Delete a staff profile, then its identity record and BasicUser.
    ///
    /// The profile delete decides the outcome. Removing the account behind it
    /// afterwards is best-effort: failures are logged and the call still
    /// succeeds, since the profile is already gone. The BasicUser is removed
    /// directly so its own cascade does not revisit the profile.
    pub async fn delete_staff_profile<R: Record + StaffRecord>(
        &self,
        profile_id: RecordId,
    ) -> Result<Option<R>, AppError> {
        let Some(profile) = self.db.delete::<R>(profile_id).await? else {
            return Ok(None);
        };

        let basic_user_id = profile.user();
        match self.db.find_by_id::<BasicUser>(basic_user_id).await {
            Ok(Some(basic_user)) => {
                if let Some(supabase_user_id) = &basic_user.supabase_user_id {
                    self.discard_identity(supabase_user_id).await;
                }
                if let Err(e) = self.db.delete::<BasicUser>(basic_user_id).await {
                    tracing::error!(
                        basic_user_id,
                        profile_id,
                        error = %e,
                        "Failed to delete BasicUser after profile deletion"
                    );
                }
            }
            Ok(None) => {
                tracing::warn!(basic_user_id, profile_id, "Profile had no BasicUser");
            }
            Err(e) => {
                tracing::error!(
                    basic_user_id,
                    profile_id,
                    error = %e,
                    "Failed to look up BasicUser after profile deletion"
                );
            }
        }

        tracing::info!(
            collection = R::COLLECTION,
            profile_id,
            basic_user_id,
            "Staff profile deleted with account"
        );
        Ok(Some(profile))
    }

    /// Delete a Patient and its identity record.
    pub async fn delete_patient(&self, id: RecordId) -> Result<Option<Patient>, AppError> {
        let Some(patient) = self.db.find_by_id::<Patient>(id).await? else {
            return Ok(None);
        };

        self.discard_identity(&patient.supabase_user_id).await;
        self.db.delete::<Patient>(id).await?;

        tracing::info!(patient_id = id, "Patient deleted");
        Ok(Some(patient))
    }
}

/// Profile records that belong to a BasicUser.
pub trait StaffRecord {
    fn user(&self) -> RecordId;
}

impl StaffRecord for ClinicStaff {
    fn user(&self) -> RecordId {
        self.user
    }
}

impl StaffRecord for PlatformStaff {
    fn user(&self) -> RecordId {
        self.user
    }
}

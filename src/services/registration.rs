// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration orchestrator.
//!
//! A registration creates the identity record first, tagged with the user
//! type, then the local records that reference it. If the local records
//! cannot be created, the identity record is deleted again on a best-effort
//! basis and the original error is returned. There is no transaction: a
//! failed cleanup leaves an orphaned identity, which is logged.

use serde::Deserialize;
use validator::Validate;

use crate::db::Db;
use crate::error::AppError;
use crate::models::{BasicUser, Patient, PlatformRole, StaffType, UserType};
use crate::services::lifecycle::{ProfileSeed, StaffProfile, UserLifecycle};
use crate::services::supabase::{CreateUserRequest, IdentityUser, SupabaseAuthClient};
use crate::time_utils::now_rfc3339;

const MISSING_FIELDS: &str =
    "Missing required fields: email, password, firstName, and lastName are required";

/// Registration form submitted by clinic staff, patients and the first admin.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Patients only, `YYYY-MM-DD`
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// Patients only
    #[serde(default)]
    pub phone: Option<String>,
}

impl RegistrationRequest {
    /// Check required fields, then field formats.
    pub fn check(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty()
            || self.password.is_empty()
            || self.first_name.trim().is_empty()
            || self.last_name.trim().is_empty()
        {
            return Err(AppError::Validation(MISSING_FIELDS.to_string()));
        }

        self.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "Invalid registration data".to_string());
            AppError::Validation(message)
        })
    }

    fn email(&self) -> String {
        self.email.trim().to_string()
    }

    /// Date of birth, if given; must be a calendar date.
    fn date_of_birth(&self) -> Result<Option<String>, AppError> {
        let Some(date_of_birth) = optional(&self.date_of_birth) else {
            return Ok(None);
        };
        chrono::NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d").map_err(|_| {
            AppError::Validation("dateOfBirth must be a date (YYYY-MM-DD)".to_string())
        })?;
        Ok(Some(date_of_birth))
    }

    fn identity_request(&self, user_type: UserType) -> CreateUserRequest {
        CreateUserRequest::tagged(
            &self.email(),
            &self.password,
            user_type,
            self.first_name.trim(),
            self.last_name.trim(),
        )
    }
}

/// Trimmed value, with blanks treated as absent.
fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Records created by a successful registration.
#[derive(Debug, Clone)]
pub enum Registered {
    Staff {
        basic_user: BasicUser,
        profile: StaffProfile,
    },
    Patient(Patient),
}

impl Registered {
    pub fn supabase_user_id(&self) -> Option<&str> {
        match self {
            Registered::Staff { basic_user, .. } => basic_user.supabase_user_id.as_deref(),
            Registered::Patient(patient) => Some(&patient.supabase_user_id),
        }
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    db: Db,
    identity: SupabaseAuthClient,
    lifecycle: UserLifecycle,
}

impl RegistrationService {
    pub fn new(db: Db, identity: SupabaseAuthClient, lifecycle: UserLifecycle) -> Self {
        Self {
            db,
            identity,
            lifecycle,
        }
    }

    /// Clinic staff self-registration; the profile starts out pending.
    pub async fn register_clinic_staff(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Registered, AppError> {
        request.check()?;
        self.register_staff(request, StaffType::Clinic, None).await
    }

    /// Bootstrap the first platform admin.
    ///
    /// Refused once any platform identity or platform BasicUser exists.
    pub async fn register_first_admin(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Registered, AppError> {
        request.check()?;

        let local_admin = self
            .db
            .find_one::<BasicUser>(&[crate::db::Filter::text("user_type", "platform")])
            .await?;
        if local_admin.is_some()
            || self
                .identity
                .any_user_with_type(UserType::Platform)
                .await?
        {
            tracing::warn!(email = %request.email(), "First admin registration refused");
            return Err(AppError::Forbidden(
                "At least one Admin user already exists".to_string(),
            ));
        }

        self.register_staff(request, StaffType::Platform, Some(PlatformRole::Admin))
            .await
    }

    /// Patient self-registration.
    ///
    /// Unlike staff accounts, patient accounts must confirm their email.
    pub async fn register_patient(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Registered, AppError> {
        request.check()?;
        let date_of_birth = request.date_of_birth()?;
        let phone = optional(&request.phone);

        let identity = self
            .create_identity(
                request,
                request
                    .identity_request(UserType::Patient)
                    .unconfirmed()
                    .with_metadata("date_of_birth", date_of_birth.as_deref())
                    .with_metadata("phone", phone.as_deref()),
            )
            .await?;

        let now = now_rfc3339();
        let created = self
            .db
            .create(Patient {
                id: 0,
                email: request.email(),
                supabase_user_id: identity.id.clone(),
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                date_of_birth,
                phone_number: phone,
                created_at: now.clone(),
                updated_at: now,
            })
            .await;

        match created {
            Ok(patient) => {
                tracing::info!(
                    supabase_user_id = %identity.id,
                    patient_id = patient.id,
                    "Patient registered"
                );
                Ok(Registered::Patient(patient))
            }
            Err(e) => Err(self.compensate(&identity, e).await),
        }
    }

    async fn register_staff(
        &self,
        request: &RegistrationRequest,
        user_type: StaffType,
        role: Option<PlatformRole>,
    ) -> Result<Registered, AppError> {
        let identity = self
            .create_identity(request, request.identity_request(user_type.into()))
            .await?;

        let seed = ProfileSeed {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            role,
            clinic: None,
        };

        match self
            .lifecycle
            .provision_staff(&identity, &request.email(), user_type, &seed)
            .await
        {
            Ok((basic_user, profile)) => {
                tracing::info!(
                    supabase_user_id = %identity.id,
                    basic_user_id = basic_user.id,
                    user_type = ?user_type,
                    "Staff registered"
                );
                Ok(Registered::Staff {
                    basic_user,
                    profile,
                })
            }
            Err(e) => Err(self.compensate(&identity, e).await),
        }
    }

    async fn create_identity(
        &self,
        request: &RegistrationRequest,
        create: CreateUserRequest,
    ) -> Result<IdentityUser, AppError> {
        let user_type = create.app_metadata["user_type"].as_str().unwrap_or_default();
        let identity = self
            .identity
            .create_user(&create)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    email = %request.email(),
                    user_type,
                    error = %e,
                    "Identity creation failed"
                );
            })?;
        Ok(identity)
    }

    /// Delete the identity created for a failed registration and hand back
    /// the error that caused the failure.
    async fn compensate(&self, identity: &IdentityUser, cause: AppError) -> AppError {
        tracing::error!(
            supabase_user_id = %identity.id,
            error = %cause,
            "Profile creation failed, deleting identity record"
        );
        self.lifecycle.discard_identity(&identity.id).await;
        cause
    }
}

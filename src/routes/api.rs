// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::access::{self, Access};
use crate::db::{Filter, RecordId};
use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::hooks::{assert_frozen_relation, ChangeOperation};
use crate::middleware::auth::AuthUser;
use crate::models::{
    ApplicationStatus, BasicUser, ClinicApplication, ClinicStaff, ClinicStaffStatus, Patient,
    PlatformRole, PlatformStaff, StaffType, UserType,
};
use crate::services::lifecycle::{
    NewBasicUser, NewStaffAccount, ProfileSeed, StaffProfile,
};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/basic-users", get(list_basic_users).post(create_basic_user))
        .route("/api/basic-users/{id}", delete(delete_basic_user))
        .route("/api/staff", post(create_staff))
        .route("/api/clinic-staff", get(list_clinic_staff))
        .route(
            "/api/clinic-staff/{id}",
            patch(update_clinic_staff).delete(delete_clinic_staff),
        )
        .route("/api/platform-staff", get(list_platform_staff))
        .route(
            "/api/platform-staff/{id}",
            patch(update_platform_staff).delete(delete_platform_staff),
        )
        .route("/api/clinic-applications", get(list_clinic_applications))
        .route(
            "/api/clinic-applications/{id}",
            patch(review_clinic_application),
        )
        .route("/api/patients", get(list_patients))
        .route("/api/patients/me", get(get_own_patient))
        .route(
            "/api/patients/{id}",
            patch(update_patient).delete(delete_patient),
        )
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    50
}

const MAX_LIMIT: u32 = 100;

/// Store filters for a read rule; a denied rule is a 403.
fn read_filters(access: Access) -> Result<Vec<Filter>> {
    access
        .filters()
        .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))
}

fn require(access: Access) -> Result<()> {
    if access.allows() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Access denied".to_string()))
    }
}

/// Trimmed, non-empty replacement for a name field.
fn non_empty(value: Option<String>, field: &str) -> Result<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(AppError::Validation(format!("{field} cannot be empty"))),
        other => Ok(other),
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: RecordId,
}

// ─── Principal ───────────────────────────────────────────────

/// Current principal response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: RecordId,
    pub supabase_user_id: String,
    pub email: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub user_type: UserType,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub clinic_id: Option<RecordId>,
}

async fn get_me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        supabase_user_id: user.supabase_user_id,
        email: user.email,
        user_type: user.user_type,
        clinic_id: user.clinic_id,
    })
}

// ─── BasicUsers ──────────────────────────────────────────────

async fn list_basic_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<BasicUser>>> {
    let filters = read_filters(access::is_platform_staff_or_self(Some(&user)))?;
    let users = state
        .db
        .find(&filters, params.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBasicUserRequest {
    pub email: String,
    pub password: Option<String>,
    pub user_type: StaffType,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Create a BasicUser directly; its identity and profile follow.
async fn create_basic_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateBasicUserRequest>,
) -> Result<Json<BasicUser>> {
    require(access::is_platform_staff(Some(&user)))?;

    let email = request.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    let basic_user = state
        .lifecycle
        .create_basic_user(NewBasicUser {
            email,
            password: request.password,
            supabase_user_id: None,
            user_type: request.user_type,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
        })
        .await?;

    tracing::info!(
        created_by = user.id,
        basic_user_id = basic_user.id,
        "BasicUser created by platform staff"
    );
    Ok(Json(basic_user))
}

async fn delete_basic_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
) -> Result<Json<DeleteResponse>> {
    require(access::is_platform_staff(Some(&user)))?;

    state
        .lifecycle
        .delete_basic_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("BasicUser {} not found", id)))?;

    tracing::info!(deleted_by = user.id, basic_user_id = id, "BasicUser deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}

// ─── Staff Accounts ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    pub email: String,
    pub user_type: StaffType,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<PlatformRole>,
    #[serde(default)]
    pub clinic: Option<RecordId>,
}

#[derive(Serialize)]
pub struct StaffAccountResponse {
    pub basic_user: BasicUser,
    pub profile: StaffProfile,
    /// Shown once; the staff member changes it on first login
    pub temporary_password: String,
}

/// Platform staff create a staff member together with their login.
async fn create_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateStaffRequest>,
) -> Result<Json<StaffAccountResponse>> {
    require(access::is_platform_staff(Some(&user)))?;

    let first_name = non_empty(Some(request.first_name), "First name")?.unwrap_or_default();
    let last_name = non_empty(Some(request.last_name), "Last name")?.unwrap_or_default();

    let account = state
        .lifecycle
        .create_staff_with_account(NewStaffAccount {
            email: request.email.trim().to_lowercase(),
            user_type: request.user_type,
            seed: ProfileSeed {
                first_name,
                last_name,
                role: request.role,
                clinic: request.clinic,
            },
        })
        .await?;

    Ok(Json(StaffAccountResponse {
        basic_user: account.basic_user,
        profile: account.profile,
        temporary_password: account.temporary_password,
    }))
}

// ─── Clinic Staff ────────────────────────────────────────────

async fn list_clinic_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<ClinicStaff>>> {
    let access = match access::is_platform_staff(Some(&user)) {
        Access::Full => Access::Full,
        _ => access::is_own_clinic_staff_profile(Some(&user)),
    };
    let filters = read_filters(access)?;
    let profiles = state
        .db
        .find(&filters, params.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(profiles))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicStaffUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: Option<ClinicStaffStatus>,
    pub clinic: Option<RecordId>,
    pub user: Option<RecordId>,
}

async fn update_clinic_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
    ApiJson(update): ApiJson<ClinicStaffUpdate>,
) -> Result<Json<ClinicStaff>> {
    let mut profile = state
        .db
        .find_by_id::<ClinicStaff>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ClinicStaff {} not found", id)))?;

    let is_platform = access::is_platform_staff(Some(&user)).allows();
    if !is_platform
        && !access::is_own_clinic_staff_profile(Some(&user)).permits_record(&profile)
    {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    if !is_platform && (update.status.is_some() || update.clinic.is_some()) {
        return Err(AppError::Forbidden(
            "Only platform staff can change approval or clinic assignment".to_string(),
        ));
    }

    assert_frozen_relation(
        ChangeOperation::Update,
        update.user,
        Some(profile.user),
        "user",
        None,
    )?;

    if let Some(first_name) = non_empty(update.first_name, "First name")? {
        profile.first_name = first_name;
    }
    if let Some(last_name) = non_empty(update.last_name, "Last name")? {
        profile.last_name = last_name;
    }
    if let Some(status) = update.status {
        tracing::info!(
            clinic_staff_id = id,
            changed_by = user.id,
            status = ?status,
            "Clinic staff status changed"
        );
        profile.status = status;
    }
    if let Some(clinic) = update.clinic {
        profile.clinic = Some(clinic);
    }
    profile.updated_at = now_rfc3339();

    state.db.update(&profile).await?;
    Ok(Json(profile))
}

async fn delete_clinic_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
) -> Result<Json<DeleteResponse>> {
    require(access::is_platform_staff(Some(&user)))?;

    state
        .lifecycle
        .delete_staff_profile::<ClinicStaff>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ClinicStaff {} not found", id)))?;
    Ok(Json(DeleteResponse { success: true, id }))
}

// ─── Platform Staff ──────────────────────────────────────────

async fn list_platform_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<PlatformStaff>>> {
    let filters = read_filters(access::is_platform_staff(Some(&user)))?;
    let profiles = state
        .db
        .find(&filters, params.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(profiles))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStaffUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<PlatformRole>,
    pub user: Option<RecordId>,
}

async fn update_platform_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
    ApiJson(update): ApiJson<PlatformStaffUpdate>,
) -> Result<Json<PlatformStaff>> {
    require(access::is_platform_staff(Some(&user)))?;

    let mut profile = state
        .db
        .find_by_id::<PlatformStaff>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("PlatformStaff {} not found", id)))?;

    assert_frozen_relation(
        ChangeOperation::Update,
        update.user,
        Some(profile.user),
        "user",
        None,
    )?;

    if let Some(first_name) = non_empty(update.first_name, "First name")? {
        profile.first_name = first_name;
    }
    if let Some(last_name) = non_empty(update.last_name, "Last name")? {
        profile.last_name = last_name;
    }
    if let Some(role) = update.role {
        profile.role = role;
    }
    profile.updated_at = now_rfc3339();

    state.db.update(&profile).await?;
    Ok(Json(profile))
}

async fn delete_platform_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
) -> Result<Json<DeleteResponse>> {
    require(access::is_platform_staff(Some(&user)))?;

    state
        .lifecycle
        .delete_staff_profile::<PlatformStaff>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("PlatformStaff {} not found", id)))?;
    Ok(Json(DeleteResponse { success: true, id }))
}

// ─── Clinic Applications ─────────────────────────────────────

async fn list_clinic_applications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<ClinicApplication>>> {
    let filters = read_filters(access::is_platform_staff(Some(&user)))?;
    let applications = state
        .db
        .find(&filters, params.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(applications))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReview {
    pub status: Option<ApplicationStatus>,
    pub review_notes: Option<String>,
}

/// Record a platform review decision on a clinic application.
async fn review_clinic_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
    ApiJson(review): ApiJson<ApplicationReview>,
) -> Result<Json<ClinicApplication>> {
    require(access::is_platform_staff(Some(&user)))?;

    let mut application = state
        .db
        .find_by_id::<ClinicApplication>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ClinicApplication {} not found", id)))?;

    if let Some(status) = review.status {
        application.status = status;
    }
    if review.review_notes.is_some() {
        application.review_notes = review.review_notes;
    }
    application.updated_at = now_rfc3339();

    state.db.update(&application).await?;
    tracing::info!(
        application_id = id,
        reviewer = user.id,
        status = application.status.as_str(),
        "Clinic application reviewed"
    );
    Ok(Json(application))
}

// ─── Patients ────────────────────────────────────────────────

async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Patient>>> {
    let filters = read_filters(access::platform_or_own_patient_resource(Some(&user), "id"))?;
    let patients = state
        .db
        .find(&filters, params.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(patients))
}

async fn get_own_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Patient>> {
    require(access::is_patient(Some(&user)))?;

    let patient = state
        .db
        .find_by_id::<Patient>(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", user.id)))?;
    Ok(Json(patient))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone_number: Option<String>,
}

async fn update_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
    ApiJson(update): ApiJson<PatientUpdate>,
) -> Result<Json<Patient>> {
    let allowed = access::is_platform_staff(Some(&user)).allows()
        || access::is_own_patient(Some(&user), Some(id)).allows();
    if !allowed {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let mut patient = state
        .db
        .find_by_id::<Patient>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", id)))?;

    if let Some(first_name) = non_empty(update.first_name, "First name")? {
        patient.first_name = first_name;
    }
    if let Some(last_name) = non_empty(update.last_name, "Last name")? {
        patient.last_name = last_name;
    }
    if let Some(date_of_birth) = update.date_of_birth {
        chrono::NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d").map_err(|_| {
            AppError::Validation("Date of birth must be YYYY-MM-DD".to_string())
        })?;
        patient.date_of_birth = Some(date_of_birth);
    }
    if let Some(phone_number) = update.phone_number {
        patient.phone_number = Some(phone_number.trim().to_string()).filter(|p| !p.is_empty());
    }
    patient.updated_at = now_rfc3339();

    state.db.update(&patient).await?;
    Ok(Json(patient))
}

async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
) -> Result<Json<DeleteResponse>> {
    require(access::is_platform_staff(Some(&user)))?;

    state
        .lifecycle
        .delete_patient(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", id)))?;

    tracing::info!(deleted_by = user.id, patient_id = id, "Patient deleted by platform staff");
    Ok(Json(DeleteResponse { success: true, id }))
}

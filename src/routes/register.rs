// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public registration routes.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::db::Filter;
use crate::models::{
    ApplicationStatus, ClinicAddress, ClinicApplication, SourceMeta, UserType, DEFAULT_COUNTRY,
};
use crate::services::registration::{Registered, RegistrationRequest};
use crate::services::supabase::ProviderError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register/clinic", post(submit_clinic_application))
        .route(
            "/api/auth/register/clinic-staff",
            post(register_clinic_staff),
        )
        .route("/api/auth/register/first-admin", post(register_first_admin))
        .route("/api/auth/register/patient", post(register_patient))
        .route(
            "/api/auth/register/patient/metadata",
            post(patient_metadata),
        )
        .route("/api/auth/register/patient/cleanup", post(patient_cleanup))
}

/// Successful registration.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegistrationResponse {
    pub success: bool,
    /// Identity record ID
    pub user_id: String,
    pub message: String,
}

impl RegistrationResponse {
    fn new(registered: &Registered, message: &str) -> Self {
        Self {
            success: true,
            user_id: registered
                .supabase_user_id()
                .unwrap_or_default()
                .to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Clinic staff self-registration.
async fn register_clinic_staff(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>> {
    let registered = state.registration.register_clinic_staff(&request).await?;
    Ok(Json(RegistrationResponse::new(
        &registered,
        "Clinic staff registration submitted. Your account is pending approval.",
    )))
}

/// Create the first platform admin.
async fn register_first_admin(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>> {
    let registered = state.registration.register_first_admin(&request).await?;
    Ok(Json(RegistrationResponse::new(
        &registered,
        "Admin user created successfully",
    )))
}

/// Patient self-registration.
async fn register_patient(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>> {
    let registered = state.registration.register_patient(&request).await?;
    Ok(Json(RegistrationResponse::new(
        &registered,
        "Patient account created successfully",
    )))
}

// ─── Clinic Applications ─────────────────────────────────────

const MISSING_APPLICATION_FIELDS: &str = "Missing required fields: clinicName, contactFirstName, \
     contactLastName, contactEmail, street, houseNumber, zipCode and city are required";

/// Public clinic application form.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClinicApplicationRequest {
    #[serde(default)]
    pub clinic_name: String,
    #[serde(default)]
    pub contact_first_name: String,
    #[serde(default)]
    pub contact_last_name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub house_number: String,
    /// Number or numeric string
    #[serde(default)]
    pub zip_code: Option<serde_json::Value>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

fn parse_zip_code(value: Option<&serde_json::Value>) -> Option<u32> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ClinicApplicationRequest {
    /// Check the form and build the record to store.
    fn into_application(self, source_meta: SourceMeta) -> Result<ClinicApplication> {
        let required = [
            &self.clinic_name,
            &self.contact_first_name,
            &self.contact_last_name,
            &self.contact_email,
            &self.street,
            &self.house_number,
            &self.city,
        ];
        let zip_code = parse_zip_code(self.zip_code.as_ref());
        if required.iter().any(|v| v.trim().is_empty()) || zip_code.is_none() {
            return Err(AppError::Validation(MISSING_APPLICATION_FIELDS.to_string()));
        }
        self.validate()
            .map_err(|_| AppError::Validation("Invalid email format".to_string()))?;

        let now = crate::time_utils::now_rfc3339();
        Ok(ClinicApplication {
            id: 0,
            clinic_name: self.clinic_name.trim().to_string(),
            contact_first_name: self.contact_first_name.trim().to_string(),
            contact_last_name: self.contact_last_name.trim().to_string(),
            contact_email: self.contact_email.trim().to_lowercase(),
            contact_phone: optional_text(self.contact_phone),
            address: ClinicAddress {
                street: self.street.trim().to_string(),
                house_number: self.house_number.trim().to_string(),
                zip_code: zip_code.unwrap_or_default(),
                city: self.city.trim().to_string(),
                country: optional_text(self.country)
                    .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            },
            additional_notes: optional_text(self.additional_notes),
            status: ApplicationStatus::Submitted,
            review_notes: None,
            source_meta,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApplicationResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: crate::db::RecordId,
    /// Set when an open application with the same clinic and email exists
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dedupe: bool,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn source_meta(headers: &HeaderMap) -> SourceMeta {
    SourceMeta {
        ip: header_value(headers, "x-forwarded-for")
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string(),
        user_agent: header_value(headers, header::USER_AGENT.as_str()).to_string(),
    }
}

async fn find_open_application(
    state: &AppState,
    application: &ClinicApplication,
) -> Result<Option<ClinicApplication>> {
    state
        .db
        .find_one(&[
            Filter::text("clinic_name", application.clinic_name.as_str()),
            Filter::text("contact_email", application.contact_email.as_str()),
            Filter::text("status", ApplicationStatus::Submitted.as_str()),
        ])
        .await
}

fn deduplicated(existing: &ClinicApplication) -> (StatusCode, Json<ApplicationResponse>) {
    tracing::info!(application_id = existing.id, "Duplicate clinic application");
    (
        StatusCode::ACCEPTED,
        Json(ApplicationResponse {
            success: true,
            id: existing.id,
            dedupe: true,
        }),
    )
}

/// Submit a clinic application for platform review.
///
/// Resubmitting while an application for the same clinic and contact email
/// is still open returns the existing one with `202 Accepted`.
async fn submit_clinic_application(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<ClinicApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>)> {
    let application = request.into_application(source_meta(&headers))?;

    if let Some(existing) = find_open_application(&state, &application).await? {
        return Ok(deduplicated(&existing));
    }

    let created = match state.db.create(application.clone()).await {
        Ok(created) => created,
        Err(e) if e.is_conflict() => {
            // Lost a race with an identical submission
            return match find_open_application(&state, &application).await? {
                Some(existing) => Ok(deduplicated(&existing)),
                None => Err(e),
            };
        }
        Err(e) => return Err(e),
    };

    tracing::info!(
        application_id = created.id,
        clinic_name = %created.clinic_name,
        "Clinic application submitted"
    );
    Ok((
        StatusCode::OK,
        Json(ApplicationResponse {
            success: true,
            id: created.id,
            dedupe: false,
        }),
    ))
}

// ─── Patient Identity ────────────────────────────────────────

/// Identifies a freshly created identity record by ID and email.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub user_id: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
}

fn emails_match(identity_email: Option<&str>, claimed: &str) -> bool {
    identity_email.is_some_and(|e| e.eq_ignore_ascii_case(claimed.trim()))
}

/// Tag a freshly created identity as a patient.
///
/// Retries are safe: an identity already tagged `patient` is left alone.
async fn patient_metadata(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<IdentityRef>,
) -> Result<Json<SuccessResponse>> {
    body.validate()
        .map_err(|_| AppError::BadRequest("Invalid payload".to_string()))?;

    let identity = state
        .identity
        .get_user_by_id(&body.user_id)
        .await
        .map_err(|e| {
            tracing::debug!(supabase_user_id = %body.user_id, error = %e, "Identity lookup failed");
            AppError::NotFound("Unable to locate Supabase user".to_string())
        })?;

    if !emails_match(identity.email.as_deref(), &body.email) {
        tracing::warn!(supabase_user_id = %body.user_id, "Patient metadata email mismatch");
        return Err(AppError::Forbidden("Email address mismatch".to_string()));
    }

    if identity.user_type() == Some(UserType::Patient) {
        return Ok(Json(SuccessResponse { success: true }));
    }

    let mut app_metadata = match identity.app_metadata {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    app_metadata.insert(
        "user_type".to_string(),
        serde_json::Value::String(UserType::Patient.as_str().to_string()),
    );

    state
        .identity
        .update_user_by_id(
            &body.user_id,
            &serde_json::json!({ "app_metadata": app_metadata }),
        )
        .await
        .map_err(|e| {
            tracing::error!(supabase_user_id = %body.user_id, error = %e, "Failed to tag identity as patient");
            ProviderError {
                status: None,
                code: e.code,
                message: "Failed to update Supabase metadata".to_string(),
            }
        })?;

    tracing::info!(supabase_user_id = %body.user_id, "Identity tagged as patient");
    Ok(Json(SuccessResponse { success: true }))
}

/// Remove an identity whose patient registration could not be completed.
async fn patient_cleanup(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<IdentityRef>,
) -> Result<Json<SuccessResponse>> {
    body.validate()
        .map_err(|_| AppError::BadRequest("Invalid payload".to_string()))?;

    let identity = match state.identity.get_user_by_id(&body.user_id).await {
        Ok(identity) => identity,
        Err(e) if e.is_not_found() => {
            tracing::info!(supabase_user_id = %body.user_id, "Identity already removed");
            return Ok(Json(SuccessResponse { success: true }));
        }
        Err(e) => return Err(e.into()),
    };

    if !emails_match(identity.email.as_deref(), &body.email) {
        tracing::warn!(supabase_user_id = %body.user_id, "Patient cleanup email mismatch");
        return Err(AppError::Forbidden("Email address mismatch".to_string()));
    }

    match state.identity.delete_user(&body.user_id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!(supabase_user_id = %body.user_id, "Orphaned patient identity removed");
    Ok(Json(SuccessResponse { success: true }))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clinic media metadata routes.
//!
//! Uploads land in the media bucket directly from the client; these routes
//! record the metadata and derive the storage path the client uploads to.

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::access;
use crate::db::RecordId;
use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::hooks::{
    assert_frozen_relation, compute_storage, ChangeOperation, FolderKey, MediaDraft,
    StorageOptions,
};
use crate::middleware::auth::AuthUser;
use crate::models::ClinicMedia;
use crate::time_utils::now_rfc3339;
use crate::AppState;

const CLINIC_MEDIA_STORAGE: StorageOptions = StorageOptions {
    key: FolderKey::DocId,
    prefix: "clinics",
    owner_required: true,
};

const CLINIC_FROZEN_MESSAGE: &str = "Clinic ownership cannot be changed once set";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/clinic-media",
            get(list_clinic_media).post(create_clinic_media),
        )
        .route("/api/clinic-media/{id}", patch(update_clinic_media))
}

/// Media record with its public URL, when a bucket is configured.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MediaResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: RecordId,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub clinic: RecordId,
    pub alt: String,
    pub caption: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub created_by: RecordId,
    pub filename: String,
    pub storage_path: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub file_size: Option<u64>,
    pub url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MediaResponse {
    fn new(state: &AppState, media: ClinicMedia) -> Self {
        let url = state
            .config
            .storage
            .as_ref()
            .map(|s| s.public_url(&media.storage_path));
        Self {
            id: media.id,
            clinic: media.clinic,
            alt: media.alt,
            caption: media.caption,
            created_by: media.created_by,
            filename: media.filename,
            storage_path: media.storage_path,
            file_size: media.file_size,
            url,
            created_at: media.created_at,
            updated_at: media.updated_at,
        }
    }
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

async fn list_clinic_media(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<MediaResponse>>> {
    let filters = access::platform_or_own_clinic_resource(Some(&user))
        .filters()
        .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))?;

    let media: Vec<ClinicMedia> = state
        .db
        .find(&filters, params.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(
        media
            .into_iter()
            .map(|m| MediaResponse::new(&state, m))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMediaRequest {
    /// Owning clinic; defaults to the caller's clinic
    #[serde(default)]
    pub clinic: Option<RecordId>,
    pub alt: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Record a new media upload and derive where it is stored.
async fn create_clinic_media(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateMediaRequest>,
) -> Result<Json<MediaResponse>> {
    let clinic = request.clinic.or(user.clinic_id);

    let access = access::platform_or_own_clinic_resource(Some(&user));
    let permitted = match (&access, clinic) {
        (access::Access::Full, _) => true,
        (access::Access::Scoped(_), Some(clinic)) => Some(clinic) == user.clinic_id,
        _ => false,
    };
    if !permitted {
        tracing::warn!(principal_id = user.id, clinic = ?clinic, "Media upload for another clinic refused");
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    if request.alt.trim().is_empty() {
        return Err(AppError::Validation("Alt text is required".to_string()));
    }

    let id = state.db.reserve_id()?;
    let storage = compute_storage(
        ChangeOperation::Create,
        &MediaDraft {
            filename: Some(&request.filename),
            owner: clinic,
            doc_id: Some(id),
            file_size: request.file_size,
            ..Default::default()
        },
        &CLINIC_MEDIA_STORAGE,
    )?;
    let (Some(filename), Some(storage_path), Some(clinic)) =
        (storage.filename, storage.storage_path, clinic)
    else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "Storage derivation returned no path on create"
        )));
    };

    let now = now_rfc3339();
    let media = state
        .db
        .create(ClinicMedia {
            id,
            clinic,
            alt: request.alt.trim().to_string(),
            caption: request.caption,
            created_by: user.id,
            filename,
            storage_path,
            file_size: request.file_size,
            created_at: now.clone(),
            updated_at: now,
        })
        .await?;

    tracing::info!(
        media_id = media.id,
        clinic = media.clinic,
        created_by = user.id,
        storage_path = %media.storage_path,
        "Clinic media recorded"
    );
    Ok(Json(MediaResponse::new(&state, media)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMediaRequest {
    pub clinic: Option<RecordId>,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub filename: Option<String>,
    pub file_size: Option<u64>,
}

/// Update media metadata; the owning clinic is frozen.
async fn update_clinic_media(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<RecordId>,
    ApiJson(update): ApiJson<UpdateMediaRequest>,
) -> Result<Json<MediaResponse>> {
    let mut media = state
        .db
        .find_by_id::<ClinicMedia>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ClinicMedia {} not found", id)))?;

    if !access::platform_or_own_clinic_resource(Some(&user)).permits_record(&media) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    assert_frozen_relation(
        ChangeOperation::Update,
        update.clinic,
        Some(media.clinic),
        "clinic",
        Some(CLINIC_FROZEN_MESSAGE),
    )?;

    let file_size = update.file_size.or(media.file_size);
    let storage = compute_storage(
        ChangeOperation::Update,
        &MediaDraft {
            filename: update.filename.as_deref(),
            previous_filename: Some(&media.filename),
            previous_storage_path: Some(&media.storage_path),
            owner: Some(media.clinic),
            doc_id: Some(media.id),
            key_field: None,
            file_size,
        },
        &CLINIC_MEDIA_STORAGE,
    )?;

    if let Some(filename) = storage.filename {
        media.filename = filename;
    }
    if let Some(storage_path) = storage.storage_path {
        media.storage_path = storage_path;
    }
    if let Some(alt) = update.alt.map(|a| a.trim().to_string()) {
        if alt.is_empty() {
            return Err(AppError::Validation("Alt text is required".to_string()));
        }
        media.alt = alt;
    }
    if update.caption.is_some() {
        media.caption = update.caption;
    }
    media.file_size = file_size;
    media.updated_at = now_rfc3339();

    state.db.update(&media).await?;
    Ok(Json(MediaResponse::new(&state, media)))
}

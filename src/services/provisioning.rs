// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! First-login provisioning of local records from identity claims.

use crate::db::{Db, Filter};
use crate::error::AppError;
use crate::models::Patient;
use crate::time_utils::now_rfc3339;

/// Identity attributes carried by a verified access token.
#[derive(Debug, Clone, Default)]
pub struct IdentityProfile {
    pub supabase_user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Find the Patient for an identity, creating it on first login.
///
/// There is no lock: two concurrent first logins race on the store's
/// uniqueness guard and the loser gets [`AppError::Conflict`].
pub async fn ensure_patient(db: &Db, identity: &IdentityProfile) -> Result<Patient, AppError> {
    if let Some(existing) = db
        .find_one::<Patient>(&[Filter::text(
            "supabase_user_id",
            identity.supabase_user_id.as_str(),
        )])
        .await?
    {
        tracing::debug!(
            supabase_user_id = %identity.supabase_user_id,
            patient_id = existing.id,
            "Found existing patient"
        );
        return Ok(existing);
    }

    let now = now_rfc3339();
    let patient = db
        .create(Patient {
            id: 0,
            email: identity.email.trim().to_string(),
            supabase_user_id: identity.supabase_user_id.clone(),
            first_name: identity.first_name.trim().to_string(),
            last_name: identity.last_name.trim().to_string(),
            date_of_birth: None,
            phone_number: None,
            created_at: now.clone(),
            updated_at: now,
        })
        .await?;

    tracing::info!(
        supabase_user_id = %identity.supabase_user_id,
        patient_id = patient.id,
        "Provisioned patient on first login"
    );

    Ok(patient)
}

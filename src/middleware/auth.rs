// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase access-token authentication middleware.
//!
//! Access tokens are HS256 JWTs signed by Supabase with the project's JWT
//! secret. After verification the token is resolved to a local principal:
//! patients are provisioned on first login, staff are looked up (or
//! provisioned) by their BasicUser, and clinic staff must be approved.

use crate::db::Filter;
use crate::error::AppError;
use crate::models::{BasicUser, ClinicStaff, ClinicStaffStatus, UserType};
use crate::services::lifecycle::NewBasicUser;
use crate::services::provisioning::{ensure_patient, IdentityProfile};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie holding the Supabase access token for browser sessions.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// Tokens this close to expiry are rejected.
const EXPIRY_BUFFER_SECS: u64 = 60;

/// Audience Supabase sets on user access tokens.
const AUDIENCE: &str = "authenticated";

/// Supabase JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity record ID)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl Claims {
    fn user_type(&self) -> Option<UserType> {
        self.app_metadata
            .get("user_type")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    fn metadata_str(&self, key: &str) -> String {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    fn identity_profile(&self) -> IdentityProfile {
        IdentityProfile {
            supabase_user_id: self.sub.clone(),
            email: self.email.clone().unwrap_or_default().trim().to_string(),
            first_name: self.metadata_str("first_name"),
            last_name: self.metadata_str("last_name"),
        }
    }
}

/// Authenticated principal.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// BasicUser ID for staff, Patient ID for patients
    pub id: u64,
    pub supabase_user_id: String,
    pub email: String,
    pub user_type: UserType,
    /// Assigned clinic of an approved clinic staff member
    pub clinic_id: Option<u64>,
}

/// Extract the bearer token, falling back to the session cookie.
fn extract_token(request: &Request, jar: &CookieJar) -> Option<String> {
    let from_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    from_header.or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
}

/// Verify a Supabase access token.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUDIENCE]);
    validation.leeway = 0;

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::InvalidToken
        })?
        .claims;

    if (claims.exp as u64) < jsonwebtoken::get_current_timestamp() + EXPIRY_BUFFER_SECS {
        return Err(AppError::InvalidToken);
    }

    Ok(claims)
}

/// Resolve verified claims to a local principal.
pub async fn resolve_principal(state: &AppState, claims: &Claims) -> Result<AuthUser, AppError> {
    let Some(user_type) = claims.user_type() else {
        tracing::warn!(supabase_user_id = %claims.sub, "Token missing a valid user_type claim");
        return Err(AppError::InvalidToken);
    };
    let identity = claims.identity_profile();

    let Some(staff_type) = user_type.staff_type() else {
        let patient = ensure_patient(&state.db, &identity).await?;
        return Ok(AuthUser {
            id: patient.id,
            supabase_user_id: patient.supabase_user_id,
            email: patient.email,
            user_type,
            clinic_id: None,
        });
    };

    let existing = state
        .db
        .find_one::<BasicUser>(&[Filter::text("supabase_user_id", claims.sub.as_str())])
        .await?;
    let basic_user = match existing {
        Some(user) => user,
        None => {
            tracing::info!(supabase_user_id = %claims.sub, user_type = %user_type, "Provisioning BasicUser on first login");
            state
                .lifecycle
                .create_basic_user(NewBasicUser {
                    email: identity.email.clone(),
                    password: None,
                    supabase_user_id: Some(claims.sub.clone()),
                    user_type: staff_type,
                    first_name: identity.first_name.clone(),
                    last_name: identity.last_name.clone(),
                })
                .await?
        }
    };

    if basic_user.user_type != staff_type {
        tracing::warn!(
            basic_user_id = basic_user.id,
            token_user_type = %user_type,
            "Token user_type does not match BasicUser"
        );
        return Err(AppError::Forbidden("User type mismatch".to_string()));
    }

    let clinic_id = if staff_type == crate::models::StaffType::Clinic {
        let profile = state
            .db
            .find_one::<ClinicStaff>(&[Filter::id("user", basic_user.id)])
            .await?;
        match profile {
            Some(p) if p.status == ClinicStaffStatus::Approved => p.clinic,
            _ => {
                tracing::info!(basic_user_id = basic_user.id, "Clinic staff not approved");
                return Err(AppError::PendingApproval);
            }
        }
    } else {
        None
    };

    Ok(AuthUser {
        id: basic_user.id,
        supabase_user_id: claims.sub.clone(),
        email: basic_user.email,
        user_type,
        clinic_id,
    })
}

/// Middleware that requires a valid Supabase session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request, &jar).ok_or(AppError::Unauthorized)?;
    let claims = verify_access_token(&token, &state.config.supabase_jwt_secret)?;
    let auth_user = resolve_principal(&state, &claims).await?;

    tracing::debug!(
        principal_id = auth_user.id,
        user_type = %auth_user.user_type,
        "Request authenticated"
    );

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"unit_test_secret";

    fn token(exp_offset: i64, aud: &str) -> String {
        let now = jsonwebtoken::get_current_timestamp() as i64;
        let claims = serde_json::json!({
            "sub": "sb-1",
            "email": "a@example.com",
            "aud": aud,
            "exp": now + exp_offset,
            "app_metadata": { "user_type": "patient" },
            "user_metadata": { "first_name": " Pat ", "last_name": "Doe" }
        });
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let claims = verify_access_token(&token(3600, AUDIENCE), SECRET).unwrap();
        assert_eq!(claims.user_type(), Some(UserType::Patient));
        assert_eq!(claims.identity_profile().first_name, "Pat");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        assert!(matches!(
            verify_access_token(&token(3600, AUDIENCE), b"other"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_inside_expiry_buffer_rejected() {
        assert!(verify_access_token(&token(30, AUDIENCE), SECRET).is_err());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        assert!(verify_access_token(&token(3600, "anon"), SECRET).is_err());
    }
}

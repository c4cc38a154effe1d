// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: password login, logout, auth callback, password reset
//! and draft-mode preview.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::auth::ACCESS_TOKEN_COOKIE;
use crate::models::UserType;
use crate::services::supabase::ProviderError;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Cookie set by the client while a PKCE sign-in is in flight.
pub const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

/// Cookie marking a draft-mode preview session.
pub const DRAFT_MODE_COOKIE: &str = "draft_mode";

/// Default session lifetime when the provider does not say.
const DEFAULT_SESSION_SECS: i64 = 60 * 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/callback", get(auth_callback))
        .route("/api/auth/password/reset", post(reset_password))
        .route("/api/preview", get(enter_preview))
        .route("/api/preview/exit", get(exit_preview))
        .route("/api/preview/status", get(preview_status))
}

/// Cookie holding the access token.
fn session_cookie(access_token: String, expires_in: Option<i64>) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, access_token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            expires_in.unwrap_or(DEFAULT_SESSION_SECS),
        ))
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Only same-site relative paths are accepted as redirect targets.
fn is_relative_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

// ─── Login / Logout ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub allowed_user_types: Vec<UserType>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginUser {
    pub id: String,
    pub email: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub user_type: UserType,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub success: bool,
    pub redirect_url: String,
    pub user: LoginUser,
}

fn redirect_for(user_type: UserType) -> &'static str {
    match user_type {
        UserType::Patient => "/patient/dashboard",
        UserType::Clinic | UserType::Platform => "/admin",
    }
}

fn allowed_types_text(types: &[UserType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Password login restricted to the user types a login page serves.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    if request.allowed_user_types.is_empty() {
        return Err(AppError::BadRequest("Invalid request".to_string()));
    }

    let session = state
        .identity
        .sign_in_with_password(request.email.trim(), &request.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Password sign-in failed");
            AppError::AuthenticationFailed(e.message)
        })?;

    let user_type = session.user.user_type();
    let Some(user_type) = user_type.filter(|t| request.allowed_user_types.contains(t)) else {
        tracing::warn!(
            supabase_user_id = %session.user.id,
            user_type = ?user_type,
            "Login attempted with a user type this page does not serve"
        );
        return Err(AppError::Forbidden(format!(
            "This login is for {} users only. Please use the correct login page.",
            allowed_types_text(&request.allowed_user_types)
        )));
    };

    tracing::info!(supabase_user_id = %session.user.id, user_type = %user_type, "User logged in");

    let jar = jar.add(session_cookie(session.access_token, session.expires_in));
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            redirect_url: redirect_for(user_type).to_string(),
            user: LoginUser {
                id: session.user.id,
                email: session.user.email,
                user_type,
            },
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    (
        jar.remove(removal_cookie(ACCESS_TOKEN_COOKIE)),
        Json(SuccessResponse { success: true }),
    )
}

// ─── Auth Callback ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    next: Option<String>,
}

/// Exchange an auth code (email confirmation, password recovery) for a session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend_url = state.config.frontend_url.trim_end_matches('/');
    let next = params
        .next
        .filter(|n| is_relative_path(n))
        .unwrap_or_else(|| "/".to_string());

    let Some(code) = params.code else {
        tracing::warn!("Auth callback without code");
        return (
            jar,
            Redirect::temporary(&format!("{}/auth/auth-code-error", frontend_url)),
        );
    };

    let verifier = jar.get(CODE_VERIFIER_COOKIE).map(|c| c.value().to_string());
    match state
        .identity
        .exchange_code_for_session(&code, verifier.as_deref())
        .await
    {
        Ok(session) => {
            tracing::info!(supabase_user_id = %session.user.id, "Auth code exchanged");
            let jar = jar
                .remove(removal_cookie(CODE_VERIFIER_COOKIE))
                .add(session_cookie(session.access_token, session.expires_in));
            (
                jar,
                Redirect::temporary(&format!("{}{}", frontend_url, next)),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Auth code exchange failed");
            (
                jar,
                Redirect::temporary(&format!("{}/auth/auth-code-error", frontend_url)),
            )
        }
    }
}

// ─── Password Reset ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Send a password recovery email.
async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    let redirect_to = request
        .redirect_to
        .filter(|p| is_relative_path(p))
        .map(|p| format!("{}{}", state.config.frontend_url.trim_end_matches('/'), p));

    state
        .identity
        .reset_password_for_email(request.email.trim(), redirect_to.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password reset request failed");
            ProviderError {
                status: None,
                code: e.code,
                message: "Failed to send password reset email".to_string(),
            }
        })?;

    Ok(Json(SuccessResponse { success: true }))
}

// ─── Draft-mode Preview ──────────────────────────────────────

fn sign_draft(secret: &str, issued_at: u64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(format!("{}:{}", DRAFT_MODE_COOKIE, issued_at).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Cookie value: `{issued_at}.{signature_hex}`.
pub fn draft_cookie_value(secret: &str, issued_at: u64) -> Result<String> {
    Ok(format!("{}.{}", issued_at, sign_draft(secret, issued_at)?))
}

/// Check a draft-mode cookie value.
pub fn verify_draft_cookie(secret: &str, value: &str) -> bool {
    let Some((issued_at, signature)) = value.split_once('.') else {
        return false;
    };
    let Ok(issued_at) = issued_at.parse::<u64>() else {
        return false;
    };
    let Ok(expected) = sign_draft(secret, issued_at) else {
        return false;
    };
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    #[serde(default)]
    secret: String,
    #[serde(default)]
    path: Option<String>,
}

/// Enable draft mode and redirect to the previewed page.
async fn enter_preview(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<PreviewParams>,
) -> Result<(CookieJar, Redirect)> {
    let expected = state.config.preview_secret.as_bytes();
    let matches: bool = expected.ct_eq(params.secret.as_bytes()).into();
    if expected.is_empty() || !matches {
        tracing::warn!("Preview requested with invalid secret");
        return Err(AppError::Forbidden("Invalid preview secret".to_string()));
    }

    let path = params.path.unwrap_or_else(|| "/".to_string());
    if !is_relative_path(&path) {
        return Err(AppError::BadRequest(
            "Preview path must be a relative path".to_string(),
        ));
    }

    let issued_at = jsonwebtoken::get_current_timestamp();
    let cookie = Cookie::build((
        DRAFT_MODE_COOKIE,
        draft_cookie_value(&state.config.preview_secret, issued_at)?,
    ))
    .path("/")
    .http_only(true)
    .secure(true)
    .same_site(SameSite::None)
    .build();

    tracing::info!(path = %path, "Draft mode enabled");
    Ok((jar.add(cookie), Redirect::temporary(&path)))
}

/// Disable draft mode.
async fn exit_preview(jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.remove(removal_cookie(DRAFT_MODE_COOKIE)),
        Redirect::temporary("/"),
    )
}

#[derive(Debug, Serialize)]
pub struct PreviewStatus {
    pub enabled: bool,
}

/// Whether the request carries a valid draft-mode cookie.
async fn preview_status(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<PreviewStatus> {
    let enabled = jar
        .get(DRAFT_MODE_COOKIE)
        .is_some_and(|c| verify_draft_cookie(&state.config.preview_secret, c.value()));
    Json(PreviewStatus { enabled })
}

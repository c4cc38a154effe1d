// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase Auth (GoTrue) client.
//!
//! Admin calls authenticate with the service role key; user-facing calls
//! (password sign-in, code exchange, password recovery) use the anon key.
//! Every failure is returned as a [`ProviderError`] for the caller to branch on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::UserType;

/// Page size used when scanning all identities.
const LIST_PAGE_SIZE: u32 = 200;

/// Error returned by the identity provider, or by the transport to it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status, if the provider answered
    pub status: Option<u16>,
    /// Provider error code (e.g. `email_exists`)
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: None,
            code: None,
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404) || self.code.as_deref() == Some("user_not_found")
    }

    /// The email (or user) is already registered.
    pub fn is_conflict(&self) -> bool {
        match (self.status, self.code.as_deref()) {
            (Some(409), _) => true,
            (Some(422), Some("email_exists" | "user_already_exists")) => true,
            (Some(422), None) => self.message.contains("already been registered"),
            _ => false,
        }
    }
}

/// GoTrue error bodies come in a few shapes depending on the endpoint.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

/// Identity record as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl IdentityUser {
    /// `app_metadata.user_type`, if present and recognised.
    pub fn user_type(&self) -> Option<UserType> {
        self.app_metadata
            .get("user_type")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// A `user_metadata` string attribute.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Session returned by sign-in and code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: IdentityUser,
}

/// Admin create-user payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: serde_json::Value,
    pub app_metadata: serde_json::Value,
}

impl CreateUserRequest {
    /// Confirmed account tagged with `user_type` and the person's names.
    ///
    /// Use [`CreateUserRequest::unconfirmed`] for accounts that must confirm
    /// their email first.
    pub fn tagged(
        email: &str,
        password: &str,
        user_type: UserType,
        first_name: &str,
        last_name: &str,
    ) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            email_confirm: true,
            user_metadata: serde_json::json!({
                "first_name": first_name,
                "last_name": last_name,
            }),
            app_metadata: serde_json::json!({ "user_type": user_type.as_str() }),
        }
    }

    /// Require the user to confirm their email before signing in.
    pub fn unconfirmed(mut self) -> Self {
        self.email_confirm = false;
        self
    }

    /// Add a `user_metadata` string attribute; `None` leaves it unset.
    pub fn with_metadata(mut self, key: &str, value: Option<&str>) -> Self {
        if let (Some(value), Some(metadata)) = (value, self.user_metadata.as_object_mut()) {
            metadata.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<IdentityUser>,
}

/// Supabase Auth client.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    service_role_key: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: &str, service_role_key: String, anon_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            service_role_key,
            anon_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.supabase_url,
            config.supabase_service_role_key.clone(),
            config.supabase_anon_key.clone(),
        )
    }

    fn admin(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    fn public(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    // ─── Admin API ───────────────────────────────────────────────

    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<IdentityUser, ProviderError> {
        let response = self
            .admin(reqwest::Method::POST, "/admin/users")
            .json(request)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let user: IdentityUser = self.check_response_json(response).await?;
        tracing::info!(supabase_user_id = %user.id, "Identity record created");
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError> {
        let response = self
            .admin(
                reqwest::Method::DELETE,
                &format!("/admin/users/{}", urlencoding::encode(user_id)),
            )
            .send()
            .await
            .map_err(ProviderError::transport)?;

        self.check_response(response).await?;
        tracing::info!(supabase_user_id = %user_id, "Identity record deleted");
        Ok(())
    }

    /// One page of identity records (pages start at 1).
    pub async fn list_users(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<IdentityUser>, ProviderError> {
        let response = self
            .admin(reqwest::Method::GET, "/admin/users")
            .query(&[("page", page.to_string()), ("per_page", per_page.to_string())])
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let list: UserList = self.check_response_json(response).await?;
        Ok(list.users)
    }

    /// True if any identity record is tagged with `user_type`.
    pub async fn any_user_with_type(&self, user_type: UserType) -> Result<bool, ProviderError> {
        let mut page = 1;
        loop {
            let users = self.list_users(page, LIST_PAGE_SIZE).await?;
            if users.iter().any(|u| u.user_type() == Some(user_type)) {
                return Ok(true);
            }
            if users.len() < LIST_PAGE_SIZE as usize {
                return Ok(false);
            }
            page += 1;
        }
    }

    /// Update attributes of an identity record (`app_metadata`, `user_metadata`, ...).
    pub async fn update_user_by_id(
        &self,
        user_id: &str,
        attributes: &serde_json::Value,
    ) -> Result<IdentityUser, ProviderError> {
        let response = self
            .admin(
                reqwest::Method::PUT,
                &format!("/admin/users/{}", urlencoding::encode(user_id)),
            )
            .json(attributes)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        self.check_response_json(response).await
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<IdentityUser, ProviderError> {
        let response = self
            .admin(
                reqwest::Method::GET,
                &format!("/admin/users/{}", urlencoding::encode(user_id)),
            )
            .send()
            .await
            .map_err(ProviderError::transport)?;

        self.check_response_json(response).await
    }

    // ─── User-facing API ─────────────────────────────────────────

    /// Send a password recovery email.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), ProviderError> {
        let mut request = self
            .public(reqwest::Method::POST, "/recover")
            .json(&serde_json::json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }

        let response = request.send().await.map_err(ProviderError::transport)?;
        self.check_response(response).await
    }

    /// Exchange a PKCE auth code for a session.
    pub async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, ProviderError> {
        let response = self
            .public(reqwest::Method::POST, "/token")
            .query(&[("grant_type", "pkce")])
            .json(&serde_json::json!({
                "auth_code": auth_code,
                "code_verifier": code_verifier.unwrap_or_default(),
            }))
            .send()
            .await
            .map_err(ProviderError::transport)?;

        self.check_response_json(response).await
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError> {
        let response = self
            .public(reqwest::Method::POST, "/token")
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(ProviderError::transport)?;

        self.check_response_json(response).await
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn error_from(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

        let message = body
            .msg
            .or(body.message)
            .or(body.error_description)
            .or_else(|| body.error.clone())
            .unwrap_or_else(|| format!("HTTP {}", status));

        tracing::debug!(status = status.as_u16(), body = %text, "Identity provider error response");

        ProviderError {
            status: Some(status.as_u16()),
            code: body.error_code.or(body.error),
            message,
        }
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), ProviderError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response.json().await.map_err(|e| ProviderError {
            status: None,
            code: None,
            message: format!("Invalid identity provider response: {}", e),
        })
    }
}

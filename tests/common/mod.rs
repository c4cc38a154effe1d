// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use findmydoc_api::config::Config;
use findmydoc_api::db::{Db, FirestoreDb};
use findmydoc_api::models::{
    BasicUser, ClinicStaff, ClinicStaffStatus, PlatformRole, PlatformStaff, StaffType,
};
use findmydoc_api::routes::create_router;
use findmydoc_api::time_utils::now_rfc3339;
use findmydoc_api::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use wiremock::MockServer;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test app over the memory store, with Supabase Auth served by `provider`.
#[allow(dead_code)]
pub fn create_test_app(provider: &MockServer) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.supabase_url = provider.uri();

    let state = Arc::new(AppState::new(config, Db::memory()));
    (create_router(state.clone()), state)
}

/// Mint a Supabase-style access token for the test JWT secret.
#[allow(dead_code)]
pub fn access_token(supabase_user_id: &str, email: &str, user_type: &str) -> String {
    let claims = serde_json::json!({
        "sub": supabase_user_id,
        "email": email,
        "aud": "authenticated",
        "exp": jsonwebtoken::get_current_timestamp() + 3600,
        "app_metadata": { "user_type": user_type },
        "user_metadata": { "first_name": "Test", "last_name": "User" }
    });

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&Config::test_default().supabase_jwt_secret),
    )
    .unwrap()
}

/// Request with a bearer token and optional JSON body.
#[allow(dead_code)]
pub fn authed(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Unauthenticated JSON POST.
#[allow(dead_code)]
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Identity record JSON as the provider returns it.
#[allow(dead_code)]
pub fn identity_json(id: &str, email: &str, user_type: Option<&str>) -> serde_json::Value {
    let app_metadata = match user_type {
        Some(t) => serde_json::json!({ "provider": "email", "user_type": t }),
        None => serde_json::json!({ "provider": "email" }),
    };
    serde_json::json!({
        "id": id,
        "email": email,
        "app_metadata": app_metadata,
        "user_metadata": { "first_name": "Test", "last_name": "User" },
        "created_at": "2026-01-01T00:00:00Z"
    })
}

/// Store a platform admin directly; returns the BasicUser.
#[allow(dead_code)]
pub async fn seed_platform_admin(db: &Db, supabase_user_id: &str, email: &str) -> BasicUser {
    let now = now_rfc3339();
    let basic_user = db
        .create(BasicUser {
            id: 0,
            email: email.to_string(),
            supabase_user_id: Some(supabase_user_id.to_string()),
            user_type: StaffType::Platform,
            first_name: Some("Ada".to_string()),
            last_name: Some("Admin".to_string()),
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .await
        .unwrap();

    db.create(PlatformStaff {
        id: 0,
        user: basic_user.id,
        first_name: "Ada".to_string(),
        last_name: "Admin".to_string(),
        role: PlatformRole::Admin,
        created_at: now.clone(),
        updated_at: now,
    })
    .await
    .unwrap();

    basic_user
}

/// Store a clinic staff member with the given approval status.
#[allow(dead_code)]
pub async fn seed_clinic_staff(
    db: &Db,
    supabase_user_id: &str,
    email: &str,
    status: ClinicStaffStatus,
    clinic: Option<u64>,
) -> (BasicUser, ClinicStaff) {
    let now = now_rfc3339();
    let basic_user = db
        .create(BasicUser {
            id: 0,
            email: email.to_string(),
            supabase_user_id: Some(supabase_user_id.to_string()),
            user_type: StaffType::Clinic,
            first_name: Some("Cleo".to_string()),
            last_name: Some("Clinic".to_string()),
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .await
        .unwrap();

    let profile = db
        .create(ClinicStaff {
            id: 0,
            user: basic_user.id,
            first_name: "Cleo".to_string(),
            last_name: "Clinic".to_string(),
            email: Some(email.to_string()),
            status,
            clinic,
            created_at: now.clone(),
            updated_at: now,
        })
        .await
        .unwrap();

    (basic_user, profile)
}

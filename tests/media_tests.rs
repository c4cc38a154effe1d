// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clinic media storage path and ownership tests.

use axum::http::StatusCode;
use findmydoc_api::models::ClinicStaffStatus;
use tower::ServiceExt;
use wiremock::MockServer;

mod common;

async fn approved_clinic_token(state: &findmydoc_api::AppState, clinic: u64) -> (String, u64) {
    let supabase_user_id = format!("sb-clinic-{clinic}");
    let email = format!("staff{clinic}@example.com");
    let (basic_user, _) = common::seed_clinic_staff(
        &state.db,
        &supabase_user_id,
        &email,
        ClinicStaffStatus::Approved,
        Some(clinic),
    )
    .await;
    (
        common::access_token(&supabase_user_id, &email, "clinic"),
        basic_user.id,
    )
}

#[tokio::test]
async fn test_clinic_media_path_derived_from_clinic_and_id() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let (token, basic_user_id) = approved_clinic_token(&state, 11).await;

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/clinic-media",
            &token,
            Some(serde_json::json!({ "alt": "Waiting room", "filename": "uploads/pic.png" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    let id = body["id"].as_u64().unwrap();
    assert_eq!(body["clinic"], 11);
    assert_eq!(body["created_by"], basic_user_id);
    assert_eq!(body["filename"], format!("11/{id}/pic.png"));
    assert_eq!(body["storage_path"], format!("clinics/11/{id}/pic.png"));
    assert!(body["url"].is_null());
}

#[tokio::test]
async fn test_clinic_media_owner_frozen() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let (token, _) = approved_clinic_token(&state, 11).await;

    let created = common::json_body(
        app.clone()
            .oneshot(common::authed(
                "POST",
                "/api/clinic-media",
                &token,
                Some(serde_json::json!({ "alt": "Front desk", "filename": "desk.jpg" })),
            ))
            .await
            .unwrap(),
    )
    .await;
    let uri = format!("/api/clinic-media/{}", created["id"]);

    let response = app
        .clone()
        .oneshot(common::authed(
            "PATCH",
            &uri,
            &token,
            Some(serde_json::json!({ "clinic": 12 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert_eq!(body["message"], "Clinic ownership cannot be changed once set");

    // Same clinic is not a change
    let response = app
        .oneshot(common::authed(
            "PATCH",
            &uri,
            &token,
            Some(serde_json::json!({ "clinic": 11, "caption": "Reception" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["caption"], "Reception");
    assert_eq!(body["storage_path"], created["storage_path"]);
}

#[tokio::test]
async fn test_clinic_media_rename_moves_path() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let (token, _) = approved_clinic_token(&state, 11).await;

    let created = common::json_body(
        app.clone()
            .oneshot(common::authed(
                "POST",
                "/api/clinic-media",
                &token,
                Some(serde_json::json!({ "alt": "Team", "filename": "team.jpg" })),
            ))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_u64().unwrap();

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-media/{id}"),
            &token,
            Some(serde_json::json!({ "filename": "team-2026.jpg" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["filename"], format!("11/{id}/team-2026.jpg"));
    assert_eq!(body["storage_path"], format!("clinics/11/{id}/team-2026.jpg"));
}

#[tokio::test]
async fn test_clinic_staff_cannot_upload_for_other_clinic() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let (token, _) = approved_clinic_token(&state, 11).await;

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/clinic-media",
            &token,
            Some(serde_json::json!({ "clinic": 12, "alt": "Sneaky", "filename": "x.png" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_other_clinic_cannot_see_or_edit_media() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let (owner, _) = approved_clinic_token(&state, 11).await;
    let (other, _) = approved_clinic_token(&state, 12).await;

    let created = common::json_body(
        app.clone()
            .oneshot(common::authed(
                "POST",
                "/api/clinic-media",
                &owner,
                Some(serde_json::json!({ "alt": "Lobby", "filename": "lobby.png" })),
            ))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .clone()
        .oneshot(common::authed("GET", "/api/clinic-media", &other, None))
        .await
        .unwrap();
    let rows = common::json_body(response).await;
    assert!(rows.as_array().unwrap().is_empty());

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-media/{}", created["id"]),
            &other,
            Some(serde_json::json!({ "alt": "Mine now" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_platform_upload_requires_clinic() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let admin = common::access_token("sb-admin", "admin@example.com", "platform");

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/clinic-media",
            &admin,
            Some(serde_json::json!({ "alt": "Logo", "filename": "logo.svg" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert_eq!(body["message"], "Unable to resolve owner for media upload");
}

#[tokio::test]
async fn test_patient_cannot_upload_media() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);
    let patient = common::access_token("sb-pat", "pat@example.com", "patient");

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/clinic-media",
            &patient,
            Some(serde_json::json!({ "clinic": 11, "alt": "x", "filename": "x.png" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

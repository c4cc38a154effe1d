// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Protected API tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Principals are provisioned on first request
//! 3. Clinic staff need an approved profile
//! 4. Staff creation and deletion keep profiles and identities in step

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use findmydoc_api::db::Filter;
use findmydoc_api::models::{BasicUser, ClinicStaffStatus, Patient, PlatformStaff};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

#[tokio::test]
async fn test_protected_route_without_token() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);

    let response = app
        .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);

    let response = app
        .oneshot(common::authed("GET", "/api/me", "not-a-jwt", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::json_body(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_token_accepted_from_cookie() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);
    let token = common::access_token("sb-pat", "pat@example.com", "patient");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::COOKIE, format!("sb-access-token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["user_type"], "patient");
}

#[tokio::test]
async fn test_patient_provisioned_once() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let token = common::access_token("sb-pat", "pat@example.com", "patient");

    let first = common::json_body(
        app.clone()
            .oneshot(common::authed("GET", "/api/patients/me", &token, None))
            .await
            .unwrap(),
    )
    .await;
    let second = common::json_body(
        app.oneshot(common::authed("GET", "/api/patients/me", &token, None))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["first_name"], "Test");

    let patients: Vec<Patient> = state
        .db
        .find(&[Filter::text("supabase_user_id", "sb-pat")], 10)
        .await
        .unwrap();
    assert_eq!(patients.len(), 1);
}

#[tokio::test]
async fn test_patient_sees_only_own_row() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);
    let alice = common::access_token("sb-alice", "alice@example.com", "patient");
    let bob = common::access_token("sb-bob", "bob@example.com", "patient");

    let bob_me = common::json_body(
        app.clone()
            .oneshot(common::authed("GET", "/api/patients/me", &bob, None))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .clone()
        .oneshot(common::authed("GET", "/api/patients", &alice, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rows = common::json_body(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["email"], "alice@example.com");

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/patients/{}", bob_me["id"]),
            &alice,
            Some(serde_json::json!({ "firstName": "Mallory" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_updates_own_record() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);
    let token = common::access_token("sb-pat", "pat@example.com", "patient");

    let me = common::json_body(
        app.clone()
            .oneshot(common::authed("GET", "/api/patients/me", &token, None))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/patients/{}", me["id"]),
            &token,
            Some(serde_json::json!({ "phoneNumber": "+1 555 0100", "dateOfBirth": "1990-04-01" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["phone_number"], "+1 555 0100");
    assert_eq!(body["date_of_birth"], "1990-04-01");
}

#[tokio::test]
async fn test_pending_clinic_staff_forbidden() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_clinic_staff(
        &state.db,
        "sb-pending",
        "pending@example.com",
        ClinicStaffStatus::Pending,
        Some(11),
    )
    .await;
    let token = common::access_token("sb-pending", "pending@example.com", "clinic");

    let response = app
        .oneshot(common::authed("GET", "/api/me", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::json_body(response).await;
    assert_eq!(body["error"], "pending_approval");
}

#[tokio::test]
async fn test_first_staff_login_provisions_basic_user_and_profile() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let token = common::access_token("sb-newadmin", "newadmin@example.com", "platform");

    let response = app
        .oneshot(common::authed("GET", "/api/me", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let basic_user: BasicUser = state
        .db
        .find_one(&[Filter::text("supabase_user_id", "sb-newadmin")])
        .await
        .unwrap()
        .expect("BasicUser should be provisioned");
    let profiles: Vec<PlatformStaff> = state
        .db
        .find(&[Filter::id("user", basic_user.id)], 10)
        .await
        .unwrap();
    assert_eq!(profiles.len(), 1);
}

#[tokio::test]
async fn test_staff_token_with_mismatched_type() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let token = common::access_token("sb-admin", "admin@example.com", "clinic");

    let response = app
        .oneshot(common::authed("GET", "/api/me", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_platform_creates_basic_user_with_one_profile() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .and(body_partial_json(serde_json::json!({
            "email": "support@example.com",
            "app_metadata": { "user_type": "platform" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::identity_json(
            "sb-support",
            "support@example.com",
            Some("platform"),
        )))
        .expect(1)
        .mount(&provider)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/auth/v1/admin/users/sb-support"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&provider)
        .await;

    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let token = common::access_token("sb-admin", "admin@example.com", "platform");

    let response = app
        .clone()
        .oneshot(common::authed(
            "POST",
            "/api/basic-users",
            &token,
            Some(serde_json::json!({
                "email": "support@example.com",
                "password": "secret123",
                "userType": "platform",
                "firstName": "Sam",
                "lastName": "Support"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = common::json_body(response).await;
    let basic_user_id = created["id"].as_u64().unwrap();
    assert_eq!(created["supabase_user_id"], "sb-support");

    let profiles: Vec<PlatformStaff> = state
        .db
        .find(&[Filter::id("user", basic_user_id)], 10)
        .await
        .unwrap();
    assert_eq!(profiles.len(), 1);

    // Deleting the BasicUser takes its profile and identity with it
    let response = app
        .oneshot(common::authed(
            "DELETE",
            &format!("/api/basic-users/{}", basic_user_id),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let profiles: Vec<PlatformStaff> = state
        .db
        .find(&[Filter::id("user", basic_user_id)], 10)
        .await
        .unwrap();
    assert!(profiles.is_empty());
    assert!(state
        .db
        .find_by_id::<BasicUser>(basic_user_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_basic_user_without_password_rejected() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&provider)
        .await;

    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let token = common::access_token("sb-admin", "admin@example.com", "platform");

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/basic-users",
            &token,
            Some(serde_json::json!({ "email": "nopw@example.com", "userType": "clinic" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert_eq!(body["message"], "Password is required to create a BasicUser");
}

#[tokio::test]
async fn test_create_staff_returns_temporary_password() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .and(body_partial_json(serde_json::json!({
            "email": "newclinic@example.com",
            "email_confirm": true,
            "app_metadata": { "user_type": "clinic" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::identity_json(
            "sb-newclinic",
            "newclinic@example.com",
            Some("clinic"),
        )))
        .expect(1)
        .mount(&provider)
        .await;

    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let token = common::access_token("sb-admin", "admin@example.com", "platform");

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/staff",
            &token,
            Some(serde_json::json!({
                "email": "newclinic@example.com",
                "userType": "clinic",
                "firstName": "Nia",
                "lastName": "Nurse",
                "clinic": 11
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["temporary_password"].as_str().unwrap().len(), 12);
    assert_eq!(body["profile"]["type"], "clinic");
    assert_eq!(body["profile"]["status"], "pending");
    assert_eq!(body["profile"]["clinic"], 11);
    assert_eq!(body["basic_user"]["supabase_user_id"], "sb-newclinic");
}

#[tokio::test]
async fn test_non_platform_cannot_create_staff() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);
    let token = common::access_token("sb-pat", "pat@example.com", "patient");

    let response = app
        .oneshot(common::authed(
            "POST",
            "/api/staff",
            &token,
            Some(serde_json::json!({
                "email": "x@example.com",
                "userType": "platform",
                "firstName": "X",
                "lastName": "Y"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_platform_approves_clinic_staff() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let (_, profile) = common::seed_clinic_staff(
        &state.db,
        "sb-clinic",
        "clinic@example.com",
        ClinicStaffStatus::Pending,
        None,
    )
    .await;
    let admin = common::access_token("sb-admin", "admin@example.com", "platform");
    let clinic = common::access_token("sb-clinic", "clinic@example.com", "clinic");

    let response = app
        .clone()
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-staff/{}", profile.id),
            &admin,
            Some(serde_json::json!({ "status": "approved", "clinic": 11 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(common::authed("GET", "/api/me", &clinic, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["clinic_id"], 11);
}

#[tokio::test]
async fn test_clinic_staff_user_relation_frozen() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let (_, profile) = common::seed_clinic_staff(
        &state.db,
        "sb-clinic",
        "clinic@example.com",
        ClinicStaffStatus::Approved,
        Some(11),
    )
    .await;
    let admin = common::access_token("sb-admin", "admin@example.com", "platform");

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-staff/{}", profile.id),
            &admin,
            Some(serde_json::json!({ "user": profile.user + 1000 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert_eq!(body["message"], "user cannot be changed once set");
}

#[tokio::test]
async fn test_clinic_staff_cannot_approve_self() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    let (_, profile) = common::seed_clinic_staff(
        &state.db,
        "sb-clinic",
        "clinic@example.com",
        ClinicStaffStatus::Approved,
        Some(11),
    )
    .await;
    let clinic = common::access_token("sb-clinic", "clinic@example.com", "clinic");

    let response = app
        .clone()
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-staff/{}", profile.id),
            &clinic,
            Some(serde_json::json!({ "clinic": 12 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-staff/{}", profile.id),
            &clinic,
            Some(serde_json::json!({ "firstName": "Cleopatra" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["first_name"], "Cleopatra");
}

#[tokio::test]
async fn test_clinic_staff_listing_scoped_to_self() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_clinic_staff(
        &state.db,
        "sb-other",
        "other@example.com",
        ClinicStaffStatus::Approved,
        Some(11),
    )
    .await;
    let (_, own) = common::seed_clinic_staff(
        &state.db,
        "sb-clinic",
        "clinic@example.com",
        ClinicStaffStatus::Approved,
        Some(11),
    )
    .await;
    let clinic = common::access_token("sb-clinic", "clinic@example.com", "clinic");

    let response = app
        .clone()
        .oneshot(common::authed("GET", "/api/clinic-staff", &clinic, None))
        .await
        .unwrap();
    let rows = common::json_body(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["id"], own.id);

    let response = app
        .oneshot(common::authed("GET", "/api/platform-staff", &clinic, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deleting_clinic_profile_removes_account() {
    let provider = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/auth/v1/admin/users/sb-clinic"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error_code": "user_not_found",
            "msg": "User not found"
        })))
        .expect(1)
        .mount(&provider)
        .await;

    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let (basic_user, profile) = common::seed_clinic_staff(
        &state.db,
        "sb-clinic",
        "clinic@example.com",
        ClinicStaffStatus::Approved,
        Some(11),
    )
    .await;
    let admin = common::access_token("sb-admin", "admin@example.com", "platform");

    let response = app
        .oneshot(common::authed(
            "DELETE",
            &format!("/api/clinic-staff/{}", profile.id),
            &admin,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(state
        .db
        .find_by_id::<BasicUser>(basic_user.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_platform_deletes_patient() {
    let provider = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/auth/v1/admin/users/sb-pat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&provider)
        .await;

    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let admin = common::access_token("sb-admin", "admin@example.com", "platform");
    let patient = common::access_token("sb-pat", "pat@example.com", "patient");

    let me = common::json_body(
        app.clone()
            .oneshot(common::authed("GET", "/api/patients/me", &patient, None))
            .await
            .unwrap(),
    )
    .await;
    let patient_id = me["id"].as_u64().unwrap();

    let response = app
        .clone()
        .oneshot(common::authed(
            "DELETE",
            &format!("/api/patients/{}", patient_id),
            &patient,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(common::authed(
            "DELETE",
            &format!("/api/patients/{}", patient_id),
            &admin,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state
        .db
        .find_by_id::<Patient>(patient_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_platform_reviews_clinic_applications() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_platform_admin(&state.db, "sb-admin", "admin@example.com").await;
    let admin = common::access_token("sb-admin", "admin@example.com", "platform");

    let submitted = common::json_body(
        app.clone()
            .oneshot(common::post_json(
                "/api/auth/register/clinic",
                serde_json::json!({
                    "clinicName": "Smile Dental",
                    "contactFirstName": "Ayse",
                    "contactLastName": "Kaya",
                    "contactEmail": "ayse@smile.example",
                    "street": "Istiklal Cd.",
                    "houseNumber": "12",
                    "zipCode": 34430,
                    "city": "Istanbul"
                }),
            ))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .clone()
        .oneshot(common::authed("GET", "/api/clinic-applications", &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rows = common::json_body(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/clinic-applications/{}", submitted["id"]),
            &admin,
            Some(serde_json::json!({ "status": "approved", "reviewNotes": "Documents verified" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["review_notes"], "Documents verified");
}

#[tokio::test]
async fn test_clinic_staff_cannot_read_applications() {
    let provider = MockServer::start().await;
    let (app, state) = common::create_test_app(&provider);
    common::seed_clinic_staff(
        &state.db,
        "sb-clinic",
        "clinic@example.com",
        ClinicStaffStatus::Approved,
        Some(11),
    )
    .await;
    let clinic = common::access_token("sb-clinic", "clinic@example.com", "clinic");

    let response = app
        .oneshot(common::authed("GET", "/api/clinic-applications", &clinic, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_update_body_is_json_bad_request() {
    let provider = MockServer::start().await;
    let (app, _) = common::create_test_app(&provider);
    let patient = common::access_token("sb-pat", "pat@example.com", "patient");

    let me = common::json_body(
        app.clone()
            .oneshot(common::authed("GET", "/api/me", &patient, None))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .oneshot(common::authed(
            "PATCH",
            &format!("/api/patients/{}", me["id"]),
            &patient,
            Some(serde_json::json!({ "firstName": 42 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert_eq!(body["error"], "bad_request");
}

mod common;

use axum::body::{to_bytes, Body};
use axum::Router;
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use consultation_cell::consultation_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{Harness, SPECIALIZATION};

fn token_for(user_id: Uuid, role: &str) -> String {
    let user = TestUser::with_id(user_id, role);
    JwtTestUtils::create_test_token(&user, &TestConfig::default().jwt_secret, Some(1))
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn create_body(harness: &Harness) -> Value {
    serde_json::to_value(harness.payload()).unwrap()
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let harness = Harness::new().await;
    let app = consultation_routes(harness.state.clone());

    let (status, body) = call(&app, Method::GET, "/host/requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("unauthenticated"));

    let user = TestUser::with_id(harness.host, "host");
    let expired = JwtTestUtils::create_expired_token(&user, &TestConfig::default().jwt_secret);
    let (status, _) = call(&app, Method::GET, "/host/requests", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let malformed = JwtTestUtils::create_malformed_token();
    let (status, body) = call(&app, Method::GET, "/requests/available", Some(&malformed), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthenticated"));
}

#[tokio::test]
async fn test_create_returns_created_with_contacted_count() {
    let harness = Harness::new().await;
    harness.add_doctor(SPECIALIZATION).await;
    harness.add_doctor(SPECIALIZATION).await;
    let app = consultation_routes(harness.state.clone());
    let token = token_for(harness.host, "host");

    let (status, body) = call(&app, Method::POST, "/requests", Some(&token), Some(create_body(&harness))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["contacted_doctors"], json!(2));
    assert_eq!(body["data"]["request"]["status"], json!("pending"));
}

#[tokio::test]
async fn test_body_user_must_match_token_subject() {
    let harness = Harness::new().await;
    harness.add_doctor(SPECIALIZATION).await;
    let app = consultation_routes(harness.state.clone());
    let token = token_for(Uuid::new_v4(), "host");

    let (status, body) = call(&app, Method::POST, "/requests", Some(&token), Some(create_body(&harness))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!("forbidden"));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_status_codes_across_the_lifecycle() {
    let harness = Harness::new().await;
    let d1 = harness.add_doctor(SPECIALIZATION).await;
    let d2 = harness.add_doctor(SPECIALIZATION).await;
    let app = consultation_routes(harness.state.clone());
    let host_token = token_for(harness.host, "host");
    let d1_token = token_for(d1, "doctor");
    let d2_token = token_for(d2, "doctor");

    let (_, created) = call(&app, Method::POST, "/requests", Some(&host_token), Some(create_body(&harness))).await;
    let id = created["data"]["request"]["id"].as_str().unwrap().to_string();

    let (status, available) = call(&app, Method::GET, "/requests/available", Some(&d1_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available["data"]["total"], json!(1));

    // confirming before anyone accepted is a state conflict
    let confirm = json!({ "doctor_id": d1, "user_id": harness.host });
    let (status, body) = call(
        &app, Method::POST, &format!("/host/request/{}/confirm-doctor", id), Some(&host_token), Some(confirm.clone()),
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("state_conflict"));

    let (status, accepted) = call(&app, Method::PUT, &format!("/requests/{}/accept", id), Some(&d1_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["data"]["status"], json!("accepted"));

    let (status, doctors) = call(
        &app, Method::GET, &format!("/host/request/{}/accepted-doctors", id), Some(&host_token), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doctors["data"][0]["id"], json!(d1));

    let (status, _) = call(
        &app, Method::POST, &format!("/host/request/{}/confirm-doctor", id), Some(&d2_token),
        Some(json!({ "doctor_id": d1 })),
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, confirmed) = call(
        &app, Method::POST, &format!("/host/request/{}/confirm-doctor", id), Some(&host_token), Some(confirm),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["data"]["assigned_doctor_id"], json!(d1));

    let (status, _) = call(
        &app, Method::POST, &format!("/consultant-appointments/{}/start", id), Some(&d2_token), None,
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, started) = call(
        &app, Method::POST, &format!("/consultant-appointments/{}/start", id), Some(&d1_token),
        Some(json!({ "consultant_id": d1 })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["data"]["status"], json!("started"));

    let (status, completed) = call(
        &app, Method::POST, &format!("/consultant-appointments/{}/complete", id), Some(&d1_token),
        Some(json!({ "consultant_id": d1, "treatment_notes": "ok", "prescriptions": "Chlorhexidine rinse" })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["data"]["treatment_notes"], json!("ok"));

    let (status, _) = call(&app, Method::PUT, &format!("/requests/{}/accept", id), Some(&d2_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, stats) = call(&app, Method::GET, "/consultant-appointments/stats", Some(&d1_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["completed"], json!(1));

    let (status, host_stats) = call(&app, Method::GET, "/host/stats", Some(&host_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(host_stats["data"]["completed"], json!(1));
}

#[tokio::test]
async fn test_validation_and_not_found_codes() {
    let harness = Harness::new().await;
    harness.add_doctor(SPECIALIZATION).await;
    let app = consultation_routes(harness.state.clone());
    let host_token = token_for(harness.host, "host");

    let mut body = create_body(&harness);
    body["duration_minutes"] = json!(0);
    let (status, response) = call(&app, Method::POST, "/requests", Some(&host_token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], json!("validation_error"));

    let (status, response) = call(
        &app, Method::POST, &format!("/host/request/{}/cancel", Uuid::new_v4()), Some(&host_token),
        Some(json!({ "cancellation_reason": "no longer needed" })),
    ).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"]["code"], json!("not_found"));

    let mut body = create_body(&harness);
    body["specialization"] = json!("Prosthodontics");
    let (status, _) = call(&app, Method::POST, "/requests", Some(&host_token), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_host_requests_with_status_filter() {
    let harness = Harness::new().await;
    harness.add_doctor(SPECIALIZATION).await;
    let app = consultation_routes(harness.state.clone());
    let host_token = token_for(harness.host, "host");

    for _ in 0..3 {
        call(&app, Method::POST, "/requests", Some(&host_token), Some(create_body(&harness))).await;
    }

    let (status, page) = call(&app, Method::GET, "/host/requests?status=pending&limit=2", Some(&host_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], json!(3));
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"]["items"][0]["clinic"]["name"], json!("Smile Dental"));

    let (status, page) = call(&app, Method::GET, "/host/requests?status=cancelled", Some(&host_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], json!(0));
}

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

use common::{
    body_json, callback_request, json_request, test_app, token_for, CRON_SECRET, MERCHANT_SECRET,
};
use edupremium_server::models::user::Role;
use edupremium_server::services::gateway::callback_signature;

#[tokio::test]
async fn health_reports_ok_with_security_headers() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    assert!(response.headers().get("strict-transport-security").is_none());

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let response = test_app()
        .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn forged_token_is_rejected() {
    let forged = edupremium_server::auth::jwt::generate_access_token(
        uuid::Uuid::new_v4(),
        Role::Admin,
        "some-other-secret",
        60,
    )
    .unwrap();

    let response = test_app()
        .oneshot(json_request("GET", "/api/admin/stats", Some(&forged), json!(null)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_other_roles() {
    let token = token_for(Role::Student);
    let response = test_app()
        .oneshot(json_request("GET", "/api/admin/stats", Some(&token), json!(null)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn featured_checkout_is_teacher_only() {
    let token = token_for(Role::Student);
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/payments/featured",
            Some(&token),
            json!({ "days": 7 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn registration_validates_before_touching_the_database() {
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "email": "ogrenci@example.com",
                "password": "short",
                "full_name": "Ali Veli",
                "role": "student"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn slot_in_the_past_is_rejected() {
    let token = token_for(Role::Teacher);
    let start = Utc::now() - Duration::hours(2);
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/availability",
            Some(&token),
            json!({ "start_time": start, "end_time": start + Duration::hours(1) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cron_requires_the_shared_secret() {
    let missing = test_app()
        .oneshot(json_request("POST", "/api/cron/reminders", None, json!(null)))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = test_app()
        .oneshot(json_request(
            "POST",
            "/api/cron/reminders",
            Some("not-the-secret"),
            json!(null),
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_cron_job_is_not_found() {
    let response = test_app()
        .oneshot(json_request(
            "POST",
            "/api/cron/vacuum",
            Some(CRON_SECRET),
            json!(null),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_with_bad_signature_is_rejected() {
    let response = test_app()
        .oneshot(callback_request(&[
            ("merchantPaymentId", "LSN-0123456789abcdef"),
            ("responseCode", "00"),
            ("sessionToken", "tok"),
            ("hash", "deadbeef"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn signed_callback_for_unknown_payment_kind_is_not_found() {
    let signature = callback_signature(MERCHANT_SECRET, "XYZ-1", "00", "tok");
    let response = test_app()
        .oneshot(callback_request(&[
            ("merchantPaymentId", "XYZ-1"),
            ("responseCode", "00"),
            ("sessionToken", "tok"),
            ("hash", &signature),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

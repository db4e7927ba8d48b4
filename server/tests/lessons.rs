//! Availability and lesson lifecycle tests against a migrated database.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use common::{
    body_json, json_request, payment_state, seed_slot, seed_student, seed_teacher,
    signed_callback, start_checkout, token_for, token_for_user, TestApp,
};
use edupremium_server::models::user::Role;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct PaidLesson {
    student: Uuid,
    teacher: Uuid,
    slot: Uuid,
    lesson_id: String,
    merchant_payment_id: String,
}

/// Gateway-paid lesson in a one-hour slot starting at `start`.
async fn paid_lesson(app: &TestApp, start: DateTime<Utc>) -> PaidLesson {
    let pool = app.pool();
    let teacher = seed_teacher(pool, Decimal::from(450)).await;
    let student = seed_student(pool).await;
    let slot = seed_slot(pool, teacher, start, 60).await;

    let merchant_payment_id = start_checkout(
        app,
        &token_for_user(student, Role::Student),
        "/api/payments/lesson",
        json!({ "availability_id": slot }),
    )
    .await;
    app.send(signed_callback(&merchant_payment_id, "00")).await;

    let lesson_id: Uuid = sqlx::query_scalar("SELECT id FROM lessons WHERE availability_id = $1")
        .bind(slot)
        .fetch_one(pool)
        .await
        .unwrap();

    PaidLesson {
        student,
        teacher,
        slot,
        lesson_id: lesson_id.to_string(),
        merchant_payment_id,
    }
}

fn slot_body(start: DateTime<Utc>, minutes: i64) -> serde_json::Value {
    json!({ "start_time": start, "end_time": start + Duration::minutes(minutes) })
}

async fn slot_exists(pool: &PgPool, slot: Uuid) -> bool {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM availability WHERE id = $1)")
        .bind(slot)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn overlapping_slot_conflicts_but_touching_slot_is_fine(pool: PgPool) {
    let app = TestApp::new(pool);
    let teacher = seed_teacher(app.pool(), Decimal::from(400)).await;
    let token = token_for_user(teacher, Role::Teacher);
    let start = Utc::now() + Duration::days(2);

    let first = app
        .send(json_request("POST", "/api/availability", Some(&token), slot_body(start, 60)))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let overlapping = app
        .send(json_request(
            "POST",
            "/api/availability",
            Some(&token),
            slot_body(start + Duration::minutes(30), 60),
        ))
        .await;
    assert_eq!(overlapping.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(overlapping).await["error"]["code"], "CONFLICT");

    let touching = app
        .send(json_request(
            "POST",
            "/api/availability",
            Some(&token),
            slot_body(start + Duration::minutes(60), 60),
        ))
        .await;
    assert_eq!(touching.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "./migrations")]
async fn public_listing_hides_booked_slots(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::days(2)).await;
    let free = seed_slot(app.pool(), lesson.teacher, Utc::now() + Duration::days(3), 60).await;

    let response = app
        .send(json_request(
            "GET",
            &format!("/api/teachers/{}/availability", lesson.teacher),
            None,
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let slots = body_json(response).await["data"].as_array().unwrap().clone();
    let ids: Vec<&str> = slots.iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![free.to_string().as_str()]);
}

#[sqlx::test(migrations = "./migrations")]
async fn slot_with_failed_checkout_can_be_deleted(pool: PgPool) {
    let app = TestApp::new(pool);
    let pool = app.pool();
    let teacher = seed_teacher(pool, Decimal::from(400)).await;
    let student = seed_student(pool).await;
    let slot = seed_slot(pool, teacher, Utc::now() + Duration::days(2), 60).await;

    let mpid = start_checkout(
        &app,
        &token_for_user(student, Role::Student),
        "/api/payments/lesson",
        json!({ "availability_id": slot }),
    )
    .await;
    app.send(signed_callback(&mpid, "51")).await;

    let response = app
        .send(json_request(
            "DELETE",
            &format!("/api/availability/{slot}"),
            Some(&token_for_user(teacher, Role::Teacher)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!slot_exists(pool, slot).await);

    let (status, _) = payment_state(pool, "pending_payments", &mpid).await;
    assert_eq!(status, "FAILED");
    let orphaned: Option<Uuid> =
        sqlx::query_scalar("SELECT availability_id FROM pending_payments WHERE merchant_payment_id = $1")
            .bind(&mpid)
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(orphaned, None);
}

#[sqlx::test(migrations = "./migrations")]
async fn slot_with_open_checkout_is_kept(pool: PgPool) {
    let app = TestApp::new(pool);
    let pool = app.pool();
    let teacher = seed_teacher(pool, Decimal::from(400)).await;
    let student = seed_student(pool).await;
    let slot = seed_slot(pool, teacher, Utc::now() + Duration::days(2), 60).await;

    start_checkout(
        &app,
        &token_for_user(student, Role::Student),
        "/api/payments/lesson",
        json!({ "availability_id": slot }),
    )
    .await;

    let response = app
        .send(json_request(
            "DELETE",
            &format!("/api/availability/{slot}"),
            Some(&token_for_user(teacher, Role::Teacher)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(slot_exists(pool, slot).await);
}

#[sqlx::test(migrations = "./migrations")]
async fn booked_slot_cannot_be_deleted(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::days(2)).await;

    let response = app
        .send(json_request(
            "DELETE",
            &format!("/api/availability/{}", lesson.slot),
            Some(&token_for_user(lesson.teacher, Role::Teacher)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn slot_released_by_cancellation_can_be_deleted(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::days(3)).await;

    let cancelled = app
        .send(json_request(
            "POST",
            &format!("/api/lessons/{}/cancel", lesson.lesson_id),
            Some(&token_for_user(lesson.student, Role::Student)),
            json!(null),
        ))
        .await;
    assert_eq!(cancelled.status(), StatusCode::OK);

    let deleted = app
        .send(json_request(
            "DELETE",
            &format!("/api/availability/{}", lesson.slot),
            Some(&token_for_user(lesson.teacher, Role::Teacher)),
            json!(null),
        ))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn cancelling_a_paid_lesson_flags_refund_and_frees_slot(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::days(3)).await;
    let emails_before = app.mailer.count();

    let response = app
        .send(json_request(
            "POST",
            &format!("/api/lessons/{}/cancel", lesson.lesson_id),
            Some(&token_for_user(lesson.student, Role::Student)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "CANCELLED");

    let (status, reason) = payment_state(app.pool(), "pending_payments", &lesson.merchant_payment_id).await;
    assert_eq!(status, "REFUND_REQUIRED");
    assert_eq!(reason.as_deref(), Some("lesson cancelled"));

    let is_booked: bool = sqlx::query_scalar("SELECT is_booked FROM availability WHERE id = $1")
        .bind(lesson.slot)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(!is_booked);
    assert_eq!(app.mailer.count(), emails_before + 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn student_cannot_cancel_inside_the_window(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::hours(5)).await;

    let response = app
        .send(json_request(
            "POST",
            &format!("/api/lessons/{}/cancel", lesson.lesson_id),
            Some(&token_for_user(lesson.student, Role::Student)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let (status, _) = payment_state(app.pool(), "pending_payments", &lesson.merchant_payment_id).await;
    assert_eq!(status, "PAID");

    // Admins are not bound by the window.
    let response = app
        .send(json_request(
            "POST",
            &format!("/api/lessons/{}/cancel", lesson.lesson_id),
            Some(&token_for(Role::Admin)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn outsiders_cannot_see_a_lesson(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::days(2)).await;

    let response = app
        .send(json_request(
            "GET",
            &format!("/api/lessons/{}", lesson.lesson_id),
            Some(&token_for(Role::Student)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(json_request(
            "GET",
            &format!("/api/lessons/{}", lesson.lesson_id),
            Some(&token_for_user(lesson.teacher, Role::Teacher)),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn upcoming_lesson_cannot_be_completed(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = paid_lesson(&app, Utc::now() + Duration::days(2)).await;

    let response = app
        .send(json_request(
            "POST",
            &format!("/api/lessons/{}/complete", lesson.lesson_id),
            Some(&token_for_user(lesson.teacher, Role::Teacher)),
            json!(null),
        ))
        .await;
    assert!(response.status().is_client_error());
}

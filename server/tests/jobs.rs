//! Reminder and maintenance job tests against a migrated database.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use common::{
    body_json, email_of, json_request, seed_slot, seed_student, seed_teacher, TestApp,
    CRON_SECRET,
};
use edupremium_server::jobs::{maintenance, reminders};
use edupremium_server::models::lesson::NewLesson;
use edupremium_server::repositories::LessonRepo;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct SeededLesson {
    id: Uuid,
    student: Uuid,
    teacher: Uuid,
}

async fn seed_lesson(pool: &PgPool, start: DateTime<Utc>) -> SeededLesson {
    let teacher = seed_teacher(pool, Decimal::from(500)).await;
    let student = seed_student(pool).await;
    let slot = seed_slot(pool, teacher, start, 60).await;
    let lesson = LessonRepo::create(
        pool,
        &NewLesson {
            teacher_id: teacher,
            student_id: student,
            availability_id: slot,
            package_payment_id: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            price: Decimal::from(600),
            meeting_link: None,
        },
    )
    .await
    .unwrap();
    SeededLesson {
        id: lesson.id,
        student,
        teacher,
    }
}

async fn reminder_flags(pool: &PgPool, lesson: Uuid) -> (bool, bool) {
    sqlx::query_as("SELECT reminder_24h_sent, reminder_1h_sent FROM lessons WHERE id = $1")
        .bind(lesson)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn lesson_status(pool: &PgPool, lesson: Uuid) -> String {
    sqlx::query_scalar("SELECT status::text FROM lessons WHERE id = $1")
        .bind(lesson)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Reminders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn hour_before_reminder_reaches_both_sides_once(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = seed_lesson(app.pool(), Utc::now() + Duration::minutes(30)).await;

    let report = reminders::send_reminders(&app.state).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(reminder_flags(app.pool(), lesson.id).await, (true, true));

    let mut recipients = app.mailer.recipients();
    recipients.sort();
    let mut expected = vec![
        email_of(app.pool(), lesson.student).await,
        email_of(app.pool(), lesson.teacher).await,
    ];
    expected.sort();
    assert_eq!(recipients, expected);

    let again = reminders::send_reminders(&app.state).await.unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(app.mailer.count(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn overlapping_runs_send_each_reminder_once(pool: PgPool) {
    let app = TestApp::new(pool);
    seed_lesson(app.pool(), Utc::now() + Duration::minutes(30)).await;

    let (first, second) = tokio::join!(
        reminders::send_reminders(&app.state),
        reminders::send_reminders(&app.state),
    );
    assert_eq!(first.unwrap().processed + second.unwrap().processed, 1);
    assert_eq!(app.mailer.count(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_reminder_is_retried_next_run(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = seed_lesson(app.pool(), Utc::now() + Duration::minutes(45)).await;

    app.mailer.set_failing(true);
    let report = reminders::send_reminders(&app.state).await.unwrap();
    assert_eq!((report.processed, report.failed), (0, 1));
    let (_, hour_sent) = reminder_flags(app.pool(), lesson.id).await;
    assert!(!hour_sent);

    app.mailer.set_failing(false);
    let report = reminders::send_reminders(&app.state).await.unwrap();
    assert_eq!((report.processed, report.failed), (1, 0));
    assert_eq!(app.mailer.count(), 2);
    assert_eq!(reminder_flags(app.pool(), lesson.id).await, (true, true));
}

#[sqlx::test(migrations = "./migrations")]
async fn day_before_reminder_leaves_hour_before_pending(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = seed_lesson(app.pool(), Utc::now() + Duration::hours(20)).await;

    let report = reminders::send_reminders(&app.state).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(reminder_flags(app.pool(), lesson.id).await, (true, false));
    assert_eq!(app.mailer.count(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn cancelled_lessons_get_no_reminder(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = seed_lesson(app.pool(), Utc::now() + Duration::minutes(30)).await;
    sqlx::query("UPDATE lessons SET status = 'CANCELLED' WHERE id = $1")
        .bind(lesson.id)
        .execute(app.pool())
        .await
        .unwrap();

    let report = reminders::send_reminders(&app.state).await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(app.mailer.count(), 0);
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn lessons_complete_after_grace_period(pool: PgPool) {
    let app = TestApp::new(pool);
    // ended three hours ago
    let old = seed_lesson(app.pool(), Utc::now() - Duration::hours(4)).await;
    // ended thirty minutes ago
    let recent = seed_lesson(app.pool(), Utc::now() - Duration::minutes(90)).await;

    let report = maintenance::complete_past_lessons(app.pool()).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(lesson_status(app.pool(), old.id).await, "COMPLETED");
    assert_eq!(lesson_status(app.pool(), recent.id).await, "CONFIRMED");
}

#[sqlx::test(migrations = "./migrations")]
async fn cron_endpoint_runs_the_named_job(pool: PgPool) {
    let app = TestApp::new(pool);
    let lesson = seed_lesson(app.pool(), Utc::now() - Duration::hours(5)).await;

    let response = app
        .send(json_request(
            "POST",
            "/api/cron/complete-lessons",
            Some(CRON_SECRET),
            json!(null),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["processed"], 1);
    assert_eq!(body["data"]["failed"], 0);
    assert_eq!(lesson_status(app.pool(), lesson.id).await, "COMPLETED");
}

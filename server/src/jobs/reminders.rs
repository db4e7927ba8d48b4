//! Lesson reminders, 24 hours and 1 hour before start.
//!
//! The hour-before pass runs first and also sets the day-before flag, so a
//! lesson booked at short notice gets one reminder instead of two. Each
//! lesson is claimed by flipping its flag before anything is sent, so
//! overlapping runs never remind twice. A lesson whose emails all fail is
//! released and retried on the next run.

use chrono::Utc;

use super::JobReport;
use crate::domain::scheduling::ReminderKind;
use crate::models::lesson::Lesson;
use crate::repositories::LessonRepo;
use crate::services::lessons::{details, participants};
use crate::services::notifications::templates;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn send_reminders(state: &AppState) -> AppResult<JobReport> {
    let mut report = JobReport::default();
    for kind in [ReminderKind::HourBefore, ReminderKind::DayBefore] {
        report.merge(send_batch(state, kind).await?);
    }
    Ok(report)
}

async fn send_batch(state: &AppState, kind: ReminderKind) -> AppResult<JobReport> {
    let lessons = LessonRepo::due_for_reminder(&state.pool, kind, Utc::now()).await?;
    let mut report = JobReport::default();

    for lesson in &lessons {
        match LessonRepo::claim_reminder(&state.pool, lesson.id, kind).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(lesson_id = %lesson.id, window = kind.label(), "Reminder taken by another run");
                continue;
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!(error = %e, lesson_id = %lesson.id, "Could not claim reminder");
                continue;
            }
        }

        match remind(state, lesson, kind).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    error = %e,
                    lesson_id = %lesson.id,
                    window = kind.label(),
                    "Reminder failed, will retry"
                );
                if let Err(e) = LessonRepo::release_reminder(&state.pool, lesson.id, kind).await {
                    tracing::error!(error = %e, lesson_id = %lesson.id, "Could not release reminder");
                }
            }
        }
    }

    if !lessons.is_empty() {
        tracing::info!(
            window = kind.label(),
            sent = report.processed,
            failed = report.failed,
            "Reminder batch finished"
        );
    }
    Ok(report)
}

/// Errors only when no email went out. A participant whose email failed
/// after the other one was reached is logged and not retried.
async fn remind(state: &AppState, lesson: &Lesson, kind: ReminderKind) -> AppResult<()> {
    let (student, teacher) = participants(state, lesson).await?;
    let info = details(lesson, &student, &teacher);

    let mut delivered = 0;
    let mut last_error = None;
    for contact in [&student, &teacher] {
        let email = templates::lesson_reminder(&contact.email, &contact.full_name, kind, &info);
        match state.notifier.email(email).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    lesson_id = %lesson.id,
                    user_id = %contact.user_id,
                    "Reminder email failed"
                );
                last_error = Some(e);
            }
        }
    }
    if let (0, Some(e)) = (delivered, last_error) {
        return Err(e.into());
    }

    if kind == ReminderKind::HourBefore {
        let text = templates::lesson_reminder_sms(kind, &info);
        for contact in [&student, &teacher] {
            if let Err(e) = state.notifier.sms(contact.phone.as_deref(), &text).await {
                tracing::warn!(error = %e, user_id = %contact.user_id, "Reminder SMS failed");
            }
        }
    }
    Ok(())
}

//! Lesson lifecycle after booking: cancellation, completion and meeting rooms.

use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::policy;
use crate::models::lesson::{Lesson, LessonStatus};
use crate::models::profile::Contact;
use crate::repositories::{AvailabilityRepo, LessonRepo, PaymentRepo, ProfileRepo};
use crate::services::notifications::templates::{self, LessonDetails};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonNotice {
    Confirmed,
    Cancelled,
}

pub async fn find_visible(state: &AppState, user: AuthUser, lesson_id: Uuid) -> AppResult<Lesson> {
    let lesson = LessonRepo::find(&state.pool, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson '{lesson_id}' was not found")))?;
    policy::check_can_view(&lesson, user.user_id, user.role)?;
    Ok(lesson)
}

pub async fn cancel_lesson(state: &AppState, user: AuthUser, lesson_id: Uuid) -> AppResult<Lesson> {
    let mut tx = state.pool.begin().await?;

    let lesson = LessonRepo::find(&mut *tx, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson '{lesson_id}' was not found")))?;
    policy::check_cancellation(
        &lesson,
        user.user_id,
        user.role,
        Utc::now(),
        state.config.cancellation_window_hours,
    )?;

    let lesson = LessonRepo::transition(
        &mut *tx,
        lesson.id,
        LessonStatus::Confirmed,
        LessonStatus::Cancelled,
    )
    .await?
    .ok_or_else(|| AppError::Conflict("Lesson status changed, try again".into()))?;

    if let Some(slot_id) = lesson.availability_id {
        AvailabilityRepo::release(&mut *tx, slot_id).await?;
    }

    let refund_flagged = match lesson.package_payment_id {
        Some(package_id) => {
            PaymentRepo::return_package_credit(&mut *tx, package_id).await?;
            false
        }
        None => PaymentRepo::flag_lesson_refund(&mut *tx, lesson.id).await?,
    };
    tx.commit().await?;

    tracing::info!(
        lesson_id = %lesson.id,
        cancelled_by = %user.user_id,
        package_id = ?lesson.package_payment_id,
        refund_flagged,
        "Lesson cancelled"
    );

    notify_participants(state, &lesson, LessonNotice::Cancelled).await;
    Ok(lesson)
}

pub async fn complete_lesson(state: &AppState, user: AuthUser, lesson_id: Uuid) -> AppResult<Lesson> {
    let lesson = LessonRepo::find(&state.pool, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson '{lesson_id}' was not found")))?;
    policy::check_completion(&lesson, user.user_id, user.role, Utc::now())?;

    let lesson = LessonRepo::transition(
        &state.pool,
        lesson.id,
        LessonStatus::Confirmed,
        LessonStatus::Completed,
    )
    .await?
    .ok_or_else(|| AppError::Conflict("Lesson status changed, try again".into()))?;

    tracing::info!(lesson_id = %lesson.id, "Lesson completed");
    Ok(lesson)
}

/// Join URL for a lesson, creating the room on first request.
pub async fn meeting_link(state: &AppState, user: AuthUser, lesson_id: Uuid) -> AppResult<String> {
    let lesson = find_visible(state, user, lesson_id).await?;
    if let Some(link) = lesson.meeting_link {
        return Ok(link);
    }
    if lesson.status != LessonStatus::Confirmed {
        return Err(AppError::Conflict("Lesson is no longer active".into()));
    }

    let provider = state
        .meetings
        .as_ref()
        .ok_or_else(|| AppError::NotFound("No meeting room for this lesson".into()))?;
    let url = provider
        .create_room(lesson.id, lesson.start_time, lesson.end_time)
        .await?;

    LessonRepo::set_meeting_link(&state.pool, lesson.id, &url)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson '{lesson_id}' was not found")))
}

/// Create a room for a freshly booked lesson. Failures are logged and the
/// lesson stays without a link until someone asks for it.
pub async fn attach_meeting_link(state: &AppState, lesson: &Lesson) -> Option<String> {
    if lesson.meeting_link.is_some() {
        return lesson.meeting_link.clone();
    }
    let provider = state.meetings.as_ref()?;

    let url = match provider
        .create_room(lesson.id, lesson.start_time, lesson.end_time)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, lesson_id = %lesson.id, "Meeting room creation failed");
            return None;
        }
    };

    match LessonRepo::set_meeting_link(&state.pool, lesson.id, &url).await {
        Ok(link) => link,
        Err(e) => {
            tracing::error!(error = %e, lesson_id = %lesson.id, "Could not store meeting link");
            None
        }
    }
}

pub(crate) async fn participants(
    state: &AppState,
    lesson: &Lesson,
) -> Result<(Contact, Contact), AppError> {
    let (student, teacher) = tokio::join!(
        ProfileRepo::contact(&state.pool, lesson.student_id),
        ProfileRepo::contact(&state.pool, lesson.teacher_id),
    );
    let missing = |id: Uuid| AppError::NotFound(format!("User '{id}' was not found"));
    Ok((
        student?.ok_or_else(|| missing(lesson.student_id))?,
        teacher?.ok_or_else(|| missing(lesson.teacher_id))?,
    ))
}

pub(crate) fn details<'a>(lesson: &'a Lesson, student: &'a Contact, teacher: &'a Contact) -> LessonDetails<'a> {
    LessonDetails {
        student_name: &student.full_name,
        teacher_name: &teacher.full_name,
        start_time: lesson.start_time,
        end_time: lesson.end_time,
        price: lesson.price,
        meeting_link: lesson.meeting_link.as_deref(),
    }
}

/// Email both sides of a lesson; never fails the caller.
pub async fn notify_participants(state: &AppState, lesson: &Lesson, notice: LessonNotice) {
    let (student, teacher) = match participants(state, lesson).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, lesson_id = %lesson.id, "Could not load lesson participants");
            return;
        }
    };
    let info = details(lesson, &student, &teacher);

    let (to_student, to_teacher) = match notice {
        LessonNotice::Confirmed => (
            templates::lesson_confirmed_student(&student.email, &info),
            templates::lesson_confirmed_teacher(&teacher.email, &info),
        ),
        LessonNotice::Cancelled => (
            templates::lesson_cancelled(&student.email, &student.full_name, &info),
            templates::lesson_cancelled(&teacher.email, &teacher.full_name, &info),
        ),
    };

    tokio::join!(
        state.notifier.email_best_effort(to_student),
        state.notifier.email_best_effort(to_teacher),
    );
}

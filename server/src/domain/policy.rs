//! Who may do what to a lesson, and where a signed-in user lands.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::lesson::{Lesson, LessonStatus};
use crate::models::user::Role;
use crate::utils::error::AppError;

/// Dashboard route for a signed-in user.
///
/// `profile` is `None` when the role-specific profile row does not exist
/// yet; for teachers the flag is the approval state.
pub fn dashboard_target(role: Role, profile: Option<bool>) -> &'static str {
    match (role, profile) {
        (Role::Admin, _) => "/admin",
        (Role::Teacher, Some(true)) => "/teacher/dashboard",
        (Role::Teacher, _) => "/teacher/onboarding",
        (Role::Student, Some(_)) => "/student/dashboard",
        (Role::Student, None) => "/student/onboarding",
    }
}

pub fn check_can_view(lesson: &Lesson, user_id: Uuid, role: Role) -> Result<(), AppError> {
    if role == Role::Admin || lesson.is_participant(user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("not a participant of this lesson".into()))
    }
}

pub fn check_cancellation(
    lesson: &Lesson,
    user_id: Uuid,
    role: Role,
    now: DateTime<Utc>,
    window_hours: i64,
) -> Result<(), AppError> {
    check_can_view(lesson, user_id, role)?;

    if lesson.status != LessonStatus::Confirmed {
        return Err(AppError::Conflict(
            "only confirmed lessons can be cancelled".into(),
        ));
    }

    if role == Role::Admin {
        return Ok(());
    }

    if lesson.start_time - now <= Duration::hours(window_hours) {
        return Err(AppError::Conflict(format!(
            "lessons can only be cancelled more than {window_hours} hours in advance"
        )));
    }

    Ok(())
}

pub fn check_completion(
    lesson: &Lesson,
    user_id: Uuid,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    match role {
        Role::Admin => {}
        Role::Teacher if lesson.teacher_id == user_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "only the lesson's teacher can complete it".into(),
            ))
        }
    }

    if lesson.status != LessonStatus::Confirmed {
        return Err(AppError::Conflict(
            "only confirmed lessons can be completed".into(),
        ));
    }

    if lesson.end_time > now {
        return Err(AppError::Conflict("lesson has not ended yet".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn lesson_at(start: DateTime<Utc>, teacher: Uuid, student: Uuid) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            teacher_id: teacher,
            student_id: student,
            availability_id: Some(Uuid::new_v4()),
            package_payment_id: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            status: LessonStatus::Confirmed,
            price: Decimal::from(600),
            meeting_link: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
            created_at: start - Duration::days(3),
            updated_at: start - Duration::days(3),
        }
    }

    #[test]
    fn dashboard_targets() {
        assert_eq!(dashboard_target(Role::Admin, None), "/admin");
        assert_eq!(dashboard_target(Role::Teacher, None), "/teacher/onboarding");
        assert_eq!(dashboard_target(Role::Teacher, Some(false)), "/teacher/onboarding");
        assert_eq!(dashboard_target(Role::Teacher, Some(true)), "/teacher/dashboard");
        assert_eq!(dashboard_target(Role::Student, None), "/student/onboarding");
        assert_eq!(dashboard_target(Role::Student, Some(false)), "/student/dashboard");
    }

    #[test]
    fn outsiders_cannot_cancel() {
        let now = Utc::now();
        let lesson = lesson_at(now + Duration::days(2), Uuid::new_v4(), Uuid::new_v4());
        let err = check_cancellation(&lesson, Uuid::new_v4(), Role::Student, now, 24).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn student_cancels_outside_window_only() {
        let now = Utc::now();
        let student = Uuid::new_v4();
        let far = lesson_at(now + Duration::hours(48), Uuid::new_v4(), student);
        assert!(check_cancellation(&far, student, Role::Student, now, 24).is_ok());

        let near = lesson_at(now + Duration::hours(3), Uuid::new_v4(), student);
        let err = check_cancellation(&near, student, Role::Student, now, 24).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn admin_ignores_window_but_not_status() {
        let now = Utc::now();
        let mut lesson = lesson_at(now + Duration::hours(1), Uuid::new_v4(), Uuid::new_v4());
        assert!(check_cancellation(&lesson, Uuid::new_v4(), Role::Admin, now, 24).is_ok());

        lesson.status = LessonStatus::Cancelled;
        assert!(check_cancellation(&lesson, Uuid::new_v4(), Role::Admin, now, 24).is_err());
    }

    #[test]
    fn completion_requires_teacher_and_elapsed_lesson() {
        let now = Utc::now();
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();
        let past = lesson_at(now - Duration::hours(3), teacher, student);
        assert!(check_completion(&past, teacher, Role::Teacher, now).is_ok());
        assert!(matches!(
            check_completion(&past, student, Role::Student, now),
            Err(AppError::Forbidden(_))
        ));

        let future = lesson_at(now + Duration::hours(3), teacher, student);
        assert!(matches!(
            check_completion(&future, teacher, Role::Teacher, now),
            Err(AppError::Conflict(_))
        ));
    }
}

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::scheduling::ReminderKind;
use crate::models::lesson::{Lesson, LessonFilter, LessonStatus, NewLesson};
use crate::models::user::Role;

const LESSON_COLUMNS: &str = "\
    id, teacher_id, student_id, availability_id, package_payment_id, start_time, end_time, \
    status, price, meeting_link, reminder_24h_sent, reminder_1h_sent, created_at, updated_at";

pub struct LessonRepo;

impl LessonRepo {
    pub async fn create(db: impl PgExecutor<'_>, lesson: &NewLesson) -> Result<Lesson, sqlx::Error> {
        let query = format!(
            "INSERT INTO lessons \
                (id, teacher_id, student_id, availability_id, package_payment_id, \
                 start_time, end_time, status, price, meeting_link) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'CONFIRMED', $8, $9) \
             RETURNING {LESSON_COLUMNS}"
        );
        sqlx::query_as::<_, Lesson>(&query)
            .bind(Uuid::new_v4())
            .bind(lesson.teacher_id)
            .bind(lesson.student_id)
            .bind(lesson.availability_id)
            .bind(lesson.package_payment_id)
            .bind(lesson.start_time)
            .bind(lesson.end_time)
            .bind(lesson.price)
            .bind(lesson.meeting_link.as_deref())
            .fetch_one(db)
            .await
    }

    pub async fn find(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1");
        sqlx::query_as::<_, Lesson>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        role: Role,
        filter: &LessonFilter,
    ) -> Result<Vec<Lesson>, sqlx::Error> {
        let owner = match role {
            Role::Teacher => "teacher_id = $1",
            Role::Student => "student_id = $1",
            Role::Admin => "$1::uuid IS NOT NULL",
        };
        let order = if filter.upcoming { "ASC" } else { "DESC" };
        let query = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons \
             WHERE {owner} \
               AND ($2::lesson_status IS NULL OR status = $2) \
               AND (NOT $3 OR start_time > NOW()) \
             ORDER BY start_time {order} LIMIT 500"
        );
        sqlx::query_as::<_, Lesson>(&query)
            .bind(user_id)
            .bind(filter.status)
            .bind(filter.upcoming)
            .fetch_all(pool)
            .await
    }

    /// Compare-and-set on status; `None` when the lesson was not in `from`.
    pub async fn transition(
        db: impl PgExecutor<'_>,
        id: Uuid,
        from: LessonStatus,
        to: LessonStatus,
    ) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!(
            "UPDATE lessons SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {LESSON_COLUMNS}"
        );
        sqlx::query_as::<_, Lesson>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(db)
            .await
    }

    pub async fn set_meeting_link(
        pool: &PgPool,
        id: Uuid,
        link: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        // Keep the first link if two requests raced to create one.
        sqlx::query_scalar::<_, Option<String>>(
            "UPDATE lessons SET meeting_link = COALESCE(meeting_link, $2), updated_at = NOW() \
             WHERE id = $1 RETURNING meeting_link",
        )
        .bind(id)
        .bind(link)
        .fetch_optional(pool)
        .await
        .map(Option::flatten)
    }

    pub async fn due_for_reminder(
        pool: &PgPool,
        kind: ReminderKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lesson>, sqlx::Error> {
        let flag = reminder_flag(kind);
        let (from, to) = kind.window(now);
        let query = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons \
             WHERE status = 'CONFIRMED' AND NOT {flag} \
               AND start_time > $1 AND start_time <= $2 \
             ORDER BY start_time"
        );
        sqlx::query_as::<_, Lesson>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Set the reminder flag if no other run has. `true` means this caller
    /// owns the reminder and must send it or call [`Self::release_reminder`].
    pub async fn claim_reminder(
        pool: &PgPool,
        id: Uuid,
        kind: ReminderKind,
    ) -> Result<bool, sqlx::Error> {
        // An hour-before reminder makes the day-before one redundant.
        let flags = match kind {
            ReminderKind::DayBefore => "reminder_24h_sent = TRUE",
            ReminderKind::HourBefore => "reminder_1h_sent = TRUE, reminder_24h_sent = TRUE",
        };
        let query = format!(
            "UPDATE lessons SET {flags}, updated_at = NOW() \
             WHERE id = $1 AND status = 'CONFIRMED' AND NOT {}",
            reminder_flag(kind)
        );
        let result = sqlx::query(&query).bind(id).execute(pool).await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn release_reminder(
        pool: &PgPool,
        id: Uuid,
        kind: ReminderKind,
    ) -> Result<(), sqlx::Error> {
        let query = format!(
            "UPDATE lessons SET {} = FALSE, updated_at = NOW() WHERE id = $1",
            reminder_flag(kind)
        );
        sqlx::query(&query).bind(id).execute(pool).await?;
        Ok(())
    }

    pub async fn complete_ended_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE lessons SET status = 'COMPLETED', updated_at = NOW() \
             WHERE status = 'CONFIRMED' AND end_time < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(LessonStatus, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT status, COUNT(*) FROM lessons GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
    }
}

fn reminder_flag(kind: ReminderKind) -> &'static str {
    match kind {
        ReminderKind::DayBefore => "reminder_24h_sent",
        ReminderKind::HourBefore => "reminder_1h_sent",
    }
}

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::availability::Availability;

const AVAILABILITY_COLUMNS: &str = "id, teacher_id, start_time, end_time, is_booked, created_at";

pub struct AvailabilityRepo;

impl AvailabilityRepo {
    pub async fn create(
        db: impl PgExecutor<'_>,
        teacher_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Availability, sqlx::Error> {
        let query = format!(
            "INSERT INTO availability (id, teacher_id, start_time, end_time) \
             VALUES ($1, $2, $3, $4) RETURNING {AVAILABILITY_COLUMNS}"
        );
        sqlx::query_as::<_, Availability>(&query)
            .bind(Uuid::new_v4())
            .bind(teacher_id)
            .bind(start_time)
            .bind(end_time)
            .fetch_one(db)
            .await
    }

    pub async fn find(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Availability>, sqlx::Error> {
        let query = format!("SELECT {AVAILABILITY_COLUMNS} FROM availability WHERE id = $1");
        sqlx::query_as::<_, Availability>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Unbooked future slots of a teacher inside `[from, to)`.
    pub async fn list_open(
        pool: &PgPool,
        teacher_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Availability>, sqlx::Error> {
        let query = format!(
            "SELECT {AVAILABILITY_COLUMNS} FROM availability \
             WHERE teacher_id = $1 AND NOT is_booked \
               AND start_time > NOW() AND start_time >= $2 AND start_time < $3 \
             ORDER BY start_time"
        );
        sqlx::query_as::<_, Availability>(&query)
            .bind(teacher_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_teacher(
        pool: &PgPool,
        teacher_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<Availability>, sqlx::Error> {
        let query = format!(
            "SELECT {AVAILABILITY_COLUMNS} FROM availability \
             WHERE teacher_id = $1 AND end_time >= $2 ORDER BY start_time"
        );
        sqlx::query_as::<_, Availability>(&query)
            .bind(teacher_id)
            .bind(from)
            .fetch_all(pool)
            .await
    }

    /// Half-open intervals: a slot may start exactly when another ends.
    pub async fn has_overlap(
        db: impl PgExecutor<'_>,
        teacher_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM availability \
             WHERE teacher_id = $1 AND start_time < $3 AND $2 < end_time)",
        )
        .bind(teacher_id)
        .bind(start_time)
        .bind(end_time)
        .fetch_one(db)
        .await
    }

    /// Returns the number of rows removed. Booked slots and slots with a
    /// checkout started after `held_since` are kept; older payment rows
    /// lose their reference.
    pub async fn delete_free(
        pool: &PgPool,
        id: Uuid,
        teacher_id: Uuid,
        held_since: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM availability a \
             WHERE a.id = $1 AND a.teacher_id = $2 AND NOT a.is_booked \
               AND NOT EXISTS (SELECT 1 FROM pending_payments p \
                               WHERE p.availability_id = a.id AND p.status = 'PENDING' \
                                 AND p.created_at > $3)",
        )
        .bind(id)
        .bind(teacher_id)
        .bind(held_since)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Atomically mark a free, future slot as booked. `None` means someone
    /// else got it first or it has already started.
    pub async fn claim(
        db: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Availability>, sqlx::Error> {
        let query = format!(
            "UPDATE availability SET is_booked = TRUE \
             WHERE id = $1 AND NOT is_booked AND start_time > NOW() \
             RETURNING {AVAILABILITY_COLUMNS}"
        );
        sqlx::query_as::<_, Availability>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn release(db: impl PgExecutor<'_>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE availability SET is_booked = FALSE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

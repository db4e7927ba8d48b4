use chrono::{Duration, Utc};
use sqlx::PgPool;

use super::JobReport;
use crate::repositories::{LessonRepo, PaymentRepo};
use crate::services::payments::PENDING_PAYMENT_TTL_MINUTES;
use crate::utils::error::AppResult;

/// Lessons are auto-completed this long after their end time.
const COMPLETION_GRACE_HOURS: i64 = 2;

pub async fn complete_past_lessons(pool: &PgPool) -> AppResult<JobReport> {
    let cutoff = Utc::now() - Duration::hours(COMPLETION_GRACE_HOURS);
    let completed = LessonRepo::complete_ended_before(pool, cutoff).await?;
    if completed > 0 {
        tracing::info!(completed, "Past lessons marked completed");
    } else {
        tracing::debug!("No lessons to complete");
    }
    Ok(JobReport {
        processed: completed,
        failed: 0,
    })
}

pub async fn expire_pending_payments(pool: &PgPool) -> AppResult<JobReport> {
    let cutoff = Utc::now() - Duration::minutes(PENDING_PAYMENT_TTL_MINUTES);
    let expired = PaymentRepo::expire_stale(pool, cutoff).await?;
    if expired > 0 {
        tracing::info!(expired, "Abandoned checkouts expired");
    } else {
        tracing::debug!("No abandoned checkouts");
    }
    Ok(JobReport {
        processed: expired,
        failed: 0,
    })
}

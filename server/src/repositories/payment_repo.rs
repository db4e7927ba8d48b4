//! Staging rows for gateway payments: `pending_payments` (single lessons),
//! `package_payments` and `featured_payments`.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::payment::{
    FeaturedPayment, NewPackagePayment, NewPendingPayment, PackagePayment, PaidAmount,
    PaymentKind, PaymentListFilter, PaymentStatus, PaymentSummary, PendingPayment,
    EXPIRED_REASON,
};

const PENDING_COLUMNS: &str = "\
    id, student_id, teacher_id, availability_id, amount, net_amount, commission_rate, \
    merchant_payment_id, session_token, status, failure_reason, lesson_id, created_at, updated_at";

const PACKAGE_COLUMNS: &str = "\
    id, student_id, teacher_id, campaign_id, lesson_count, lessons_remaining, amount, \
    commission_rate, merchant_payment_id, session_token, status, failure_reason, \
    created_at, updated_at";

const FEATURED_COLUMNS: &str = "\
    id, teacher_id, days, amount, merchant_payment_id, session_token, status, failure_reason, \
    starts_at, ends_at, created_at, updated_at";

const PAYMENT_LEDGER: &str = "\
    SELECT id, 'lesson' AS kind, merchant_payment_id, student_id AS payer_id, amount, status, \
           failure_reason, created_at FROM pending_payments \
    UNION ALL \
    SELECT id, 'package', merchant_payment_id, student_id, amount, status, \
           failure_reason, created_at FROM package_payments \
    UNION ALL \
    SELECT id, 'featured', merchant_payment_id, teacher_id, amount, status, \
           failure_reason, created_at FROM featured_payments";

fn table(kind: PaymentKind) -> &'static str {
    match kind {
        PaymentKind::Lesson => "pending_payments",
        PaymentKind::Package => "package_payments",
        PaymentKind::Featured => "featured_payments",
    }
}

fn kind_name(kind: PaymentKind) -> &'static str {
    match kind {
        PaymentKind::Lesson => "lesson",
        PaymentKind::Package => "package",
        PaymentKind::Featured => "featured",
    }
}

fn lock_clause(for_update: bool) -> &'static str {
    if for_update {
        " FOR UPDATE"
    } else {
        ""
    }
}

pub struct PaymentRepo;

impl PaymentRepo {
    // -----------------------------------------------------------------------
    // Single lessons
    // -----------------------------------------------------------------------

    pub async fn create_pending(
        db: impl PgExecutor<'_>,
        merchant_payment_id: &str,
        input: &NewPendingPayment,
    ) -> Result<PendingPayment, sqlx::Error> {
        let query = format!(
            "INSERT INTO pending_payments \
                (id, student_id, teacher_id, availability_id, amount, net_amount, \
                 commission_rate, merchant_payment_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PENDING_COLUMNS}"
        );
        sqlx::query_as::<_, PendingPayment>(&query)
            .bind(Uuid::new_v4())
            .bind(input.student_id)
            .bind(input.teacher_id)
            .bind(input.availability_id)
            .bind(input.amount)
            .bind(input.net_amount)
            .bind(input.commission_rate)
            .bind(merchant_payment_id)
            .fetch_one(db)
            .await
    }

    pub async fn find_pending(
        db: impl PgExecutor<'_>,
        merchant_payment_id: &str,
        for_update: bool,
    ) -> Result<Option<PendingPayment>, sqlx::Error> {
        let query = format!(
            "SELECT {PENDING_COLUMNS} FROM pending_payments WHERE merchant_payment_id = $1{}",
            lock_clause(for_update)
        );
        sqlx::query_as::<_, PendingPayment>(&query)
            .bind(merchant_payment_id)
            .fetch_optional(db)
            .await
    }

    /// Whether another student has an open checkout for this slot.
    pub async fn slot_held_by_other(
        db: impl PgExecutor<'_>,
        availability_id: Uuid,
        student_id: Uuid,
        newer_than: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pending_payments \
             WHERE availability_id = $1 AND student_id <> $2 \
               AND status = 'PENDING' AND created_at > $3)",
        )
        .bind(availability_id)
        .bind(student_id)
        .bind(newer_than)
        .fetch_one(db)
        .await
    }

    /// Flag the gateway payment behind a cancelled lesson for a manual refund.
    pub async fn flag_lesson_refund(
        db: impl PgExecutor<'_>,
        lesson_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pending_payments \
             SET status = 'REFUND_REQUIRED', failure_reason = 'lesson cancelled', updated_at = NOW() \
             WHERE lesson_id = $1 AND status = 'PAID'",
        )
        .bind(lesson_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_lesson_paid(
        db: impl PgExecutor<'_>,
        id: Uuid,
        lesson_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE pending_payments SET status = 'PAID', lesson_id = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(lesson_id)
        .execute(db)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Packages
    // -----------------------------------------------------------------------

    pub async fn create_package(
        db: impl PgExecutor<'_>,
        merchant_payment_id: &str,
        input: &NewPackagePayment,
    ) -> Result<PackagePayment, sqlx::Error> {
        let query = format!(
            "INSERT INTO package_payments \
                (id, student_id, teacher_id, campaign_id, lesson_count, amount, \
                 commission_rate, merchant_payment_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PACKAGE_COLUMNS}"
        );
        sqlx::query_as::<_, PackagePayment>(&query)
            .bind(Uuid::new_v4())
            .bind(input.student_id)
            .bind(input.teacher_id)
            .bind(input.campaign_id)
            .bind(input.lesson_count)
            .bind(input.amount)
            .bind(input.commission_rate)
            .bind(merchant_payment_id)
            .fetch_one(db)
            .await
    }

    pub async fn find_package_by_merchant_id(
        db: impl PgExecutor<'_>,
        merchant_payment_id: &str,
        for_update: bool,
    ) -> Result<Option<PackagePayment>, sqlx::Error> {
        let query = format!(
            "SELECT {PACKAGE_COLUMNS} FROM package_payments WHERE merchant_payment_id = $1{}",
            lock_clause(for_update)
        );
        sqlx::query_as::<_, PackagePayment>(&query)
            .bind(merchant_payment_id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_package(
        db: impl PgExecutor<'_>,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<PackagePayment>, sqlx::Error> {
        let query = format!(
            "SELECT {PACKAGE_COLUMNS} FROM package_payments WHERE id = $1{}",
            lock_clause(for_update)
        );
        sqlx::query_as::<_, PackagePayment>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_packages_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<PackagePayment>, sqlx::Error> {
        let query = format!(
            "SELECT {PACKAGE_COLUMNS} FROM package_payments \
             WHERE student_id = $1 AND status = 'PAID' ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PackagePayment>(&query)
            .bind(student_id)
            .fetch_all(pool)
            .await
    }

    pub async fn mark_package_paid(db: impl PgExecutor<'_>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE package_payments \
             SET status = 'PAID', lessons_remaining = lesson_count, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Decrement remaining lessons; `false` when the package is used up.
    pub async fn take_package_credit(db: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE package_payments \
             SET lessons_remaining = lessons_remaining - 1, updated_at = NOW() \
             WHERE id = $1 AND status = 'PAID' AND lessons_remaining > 0",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn return_package_credit(db: impl PgExecutor<'_>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE package_payments \
             SET lessons_remaining = LEAST(lessons_remaining + 1, lesson_count), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Featured placement
    // -----------------------------------------------------------------------

    pub async fn create_featured(
        db: impl PgExecutor<'_>,
        merchant_payment_id: &str,
        teacher_id: Uuid,
        days: i32,
        amount: rust_decimal::Decimal,
    ) -> Result<FeaturedPayment, sqlx::Error> {
        let query = format!(
            "INSERT INTO featured_payments (id, teacher_id, days, amount, merchant_payment_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {FEATURED_COLUMNS}"
        );
        sqlx::query_as::<_, FeaturedPayment>(&query)
            .bind(Uuid::new_v4())
            .bind(teacher_id)
            .bind(days)
            .bind(amount)
            .bind(merchant_payment_id)
            .fetch_one(db)
            .await
    }

    pub async fn find_featured_by_merchant_id(
        db: impl PgExecutor<'_>,
        merchant_payment_id: &str,
        for_update: bool,
    ) -> Result<Option<FeaturedPayment>, sqlx::Error> {
        let query = format!(
            "SELECT {FEATURED_COLUMNS} FROM featured_payments WHERE merchant_payment_id = $1{}",
            lock_clause(for_update)
        );
        sqlx::query_as::<_, FeaturedPayment>(&query)
            .bind(merchant_payment_id)
            .fetch_optional(db)
            .await
    }

    pub async fn mark_featured_paid(
        db: impl PgExecutor<'_>,
        id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE featured_payments \
             SET status = 'PAID', starts_at = $2, ends_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(starts_at)
        .bind(ends_at)
        .execute(db)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Shared status handling
    // -----------------------------------------------------------------------

    pub async fn set_session_token(
        db: impl PgExecutor<'_>,
        kind: PaymentKind,
        id: Uuid,
        session_token: &str,
    ) -> Result<(), sqlx::Error> {
        let query = format!(
            "UPDATE {} SET session_token = $2, updated_at = NOW() WHERE id = $1",
            table(kind)
        );
        sqlx::query(&query)
            .bind(id)
            .bind(session_token)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Move a `PENDING` row to `status`. Returns `false` if it was no longer pending.
    pub async fn settle(
        db: impl PgExecutor<'_>,
        kind: PaymentKind,
        id: Uuid,
        status: PaymentStatus,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET status = $2, failure_reason = $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING'",
            table(kind)
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(status)
            .bind(reason)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put a checkout failed by the expiry job back to `PENDING`.
    pub async fn reopen_expired(
        db: impl PgExecutor<'_>,
        kind: PaymentKind,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET status = 'PENDING', failure_reason = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'FAILED' AND failure_reason = $2",
            table(kind)
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(EXPIRED_REASON)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Close `REFUND_REQUIRED` rows once the money went back to the customer.
    pub async fn mark_refunded(
        pool: &PgPool,
        kind: PaymentKind,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET status = 'FAILED', failure_reason = 'refunded', updated_at = NOW() \
             WHERE id = $1 AND status = 'REFUND_REQUIRED'",
            table(kind)
        );
        let result = sqlx::query(&query).bind(id).execute(pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Fail checkouts the customer abandoned before `cutoff`.
    pub async fn expire_stale(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let mut expired = 0;
        for kind in [PaymentKind::Lesson, PaymentKind::Package, PaymentKind::Featured] {
            let query = format!(
                "UPDATE {} SET status = 'FAILED', failure_reason = $2, updated_at = NOW() \
                 WHERE status = 'PENDING' AND created_at < $1",
                table(kind)
            );
            expired += sqlx::query(&query)
                .bind(cutoff)
                .bind(EXPIRED_REASON)
                .execute(pool)
                .await?
                .rows_affected();
        }
        Ok(expired)
    }

    pub async fn list(
        pool: &PgPool,
        filter: &PaymentListFilter,
    ) -> Result<Vec<PaymentSummary>, sqlx::Error> {
        let query = format!(
            "SELECT id, kind, merchant_payment_id, payer_id, amount, status, failure_reason, created_at \
             FROM ({PAYMENT_LEDGER}) ledger \
             WHERE ($1::text IS NULL OR kind = $1) \
               AND ($2::payment_status IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT 500"
        );
        sqlx::query_as::<_, PaymentSummary>(&query)
            .bind(filter.kind.map(kind_name))
            .bind(filter.status)
            .fetch_all(pool)
            .await
    }

    pub async fn paid_amounts(pool: &PgPool) -> Result<Vec<PaidAmount>, sqlx::Error> {
        sqlx::query_as::<_, PaidAmount>(
            "SELECT amount, net_amount, commission_rate \
             FROM pending_payments WHERE status = 'PAID' \
             UNION ALL \
             SELECT amount, NULL, commission_rate FROM package_payments WHERE status = 'PAID' \
             UNION ALL \
             SELECT amount, NULL, NULL FROM featured_payments WHERE status = 'PAID'",
        )
        .fetch_all(pool)
        .await
    }
}

//! Checkout and the gateway callback pipeline.
//!
//! Every purchase follows the same path: a `PENDING` staging row is written,
//! a gateway session is opened for it, and the customer is redirected to the
//! hosted payment page. The gateway then posts the result to
//! [`handle_callback`], which promotes the staging row inside a single
//! transaction holding a row lock on it. Repeated callbacks for the same
//! payment are answered from the stored status without side effects.
//!
//! Notifications and meeting rooms are created only after the transaction
//! commits, and their failures never undo a confirmed purchase.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::{pricing, scheduling};
use crate::models::lesson::{Lesson, NewLesson};
use crate::models::payment::{
    NewPackagePayment, NewPendingPayment, PaymentKind, PaymentRedirect, PaymentStatus,
    EXPIRED_REASON,
};
use crate::models::profile::Contact;
use crate::repositories::{
    AvailabilityRepo, CampaignRepo, LessonRepo, PaymentRepo, ProfileRepo,
};
use crate::services::gateway::{CallbackPayload, SessionRequest};
use crate::services::lessons;
use crate::services::notifications::templates;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// Another student's checkout keeps a slot off the market this long.
pub const CHECKOUT_HOLD_MINUTES: i64 = 15;
/// Unfinished checkouts older than this are failed by the maintenance job.
pub const PENDING_PAYMENT_TTL_MINUTES: i64 = 60;

pub const CALLBACK_PATH: &str = "/api/payments/callback";

/// Where the customer's browser goes once the callback is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub merchant_payment_id: String,
    pub succeeded: bool,
}

impl CallbackOutcome {
    fn from_status(merchant_payment_id: &str, status: PaymentStatus) -> Self {
        Self {
            merchant_payment_id: merchant_payment_id.to_string(),
            succeeded: status.is_settled_ok(),
        }
    }

    pub fn redirect_url(&self, frontend_url: &str) -> String {
        let page = if self.succeeded { "success" } else { "failure" };
        format!(
            "{frontend_url}/payment/{page}?ref={}",
            self.merchant_payment_id
        )
    }
}

async fn require_contact(state: &AppState, user_id: Uuid) -> AppResult<Contact> {
    ProfileRepo::contact(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{user_id}' was not found")))
}

/// Open a gateway session for a freshly written staging row. If the gateway
/// refuses, the row is failed so it never lingers as `PENDING`.
async fn open_session(
    state: &AppState,
    kind: PaymentKind,
    payment_id: Uuid,
    merchant_payment_id: &str,
    amount: Decimal,
    payer: &Contact,
    description: String,
) -> AppResult<PaymentRedirect> {
    let request = SessionRequest {
        merchant_payment_id: merchant_payment_id.to_string(),
        amount,
        customer_id: payer.user_id.to_string(),
        customer_name: payer.full_name.clone(),
        customer_email: payer.email.clone(),
        customer_phone: payer.phone.clone(),
        description,
        return_url: format!("{}{}", state.config.public_api_url, CALLBACK_PATH),
    };

    let session = match state.gateway.create_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, merchant_payment_id, "Could not open gateway session");
            PaymentRepo::settle(
                &state.pool,
                kind,
                payment_id,
                PaymentStatus::Failed,
                "gateway session failed",
            )
            .await?;
            return Err(e.into());
        }
    };

    PaymentRepo::set_session_token(&state.pool, kind, payment_id, &session.session_token).await?;

    Ok(PaymentRedirect {
        payment_id,
        merchant_payment_id: merchant_payment_id.to_string(),
        amount,
        redirect_url: session.redirect_url,
    })
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

pub async fn initiate_lesson_payment(
    state: &AppState,
    student_id: Uuid,
    availability_id: Uuid,
) -> AppResult<PaymentRedirect> {
    ProfileRepo::find_student(&state.pool, student_id)
        .await?
        .ok_or_else(|| AppError::ValidationError("Complete your student profile first".into()))?;

    let slot = AvailabilityRepo::find(&state.pool, availability_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Slot '{availability_id}' was not found")))?;

    let now = Utc::now();
    if slot.is_booked {
        return Err(AppError::Conflict("This slot is already booked".into()));
    }
    if slot.start_time <= now {
        return Err(AppError::ValidationError("This slot has already started".into()));
    }
    let hold_since = now - Duration::minutes(CHECKOUT_HOLD_MINUTES);
    if PaymentRepo::slot_held_by_other(&state.pool, slot.id, student_id, hold_since).await? {
        return Err(AppError::Conflict(
            "Another student is completing payment for this slot".into(),
        ));
    }

    let teacher = ProfileRepo::find_teacher(&state.pool, slot.teacher_id)
        .await?
        .filter(|t| t.is_approved)
        .ok_or_else(|| AppError::Conflict("This teacher is not accepting bookings".into()))?;

    let net = pricing::slot_net_price(teacher.hourly_rate, slot.duration_minutes())?;
    if net <= Decimal::ZERO {
        return Err(AppError::Conflict("This teacher has not set a price yet".into()));
    }
    let commission = state.config.commission_percent;
    let gross = pricing::gross_price(net, commission)?;

    let merchant_payment_id = PaymentKind::Lesson.new_merchant_payment_id();
    let payment = PaymentRepo::create_pending(
        &state.pool,
        &merchant_payment_id,
        &NewPendingPayment {
            student_id,
            teacher_id: slot.teacher_id,
            availability_id: slot.id,
            amount: gross,
            net_amount: net,
            commission_rate: commission,
        },
    )
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        %merchant_payment_id,
        %student_id,
        teacher_id = %slot.teacher_id,
        amount = %gross,
        "Lesson checkout started"
    );

    let payer = require_contact(state, student_id).await?;
    let description = format!(
        "{} - {}",
        teacher.full_name,
        templates::format_local(slot.start_time)
    );
    open_session(
        state,
        PaymentKind::Lesson,
        payment.id,
        &merchant_payment_id,
        gross,
        &payer,
        description,
    )
    .await
}

pub async fn initiate_package_payment(
    state: &AppState,
    student_id: Uuid,
    teacher_id: Uuid,
    campaign_id: Uuid,
) -> AppResult<PaymentRedirect> {
    ProfileRepo::find_student(&state.pool, student_id)
        .await?
        .ok_or_else(|| AppError::ValidationError("Complete your student profile first".into()))?;

    let campaign = CampaignRepo::find(&state.pool, campaign_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Campaign '{campaign_id}' was not found")))?;

    let teacher = ProfileRepo::find_teacher(&state.pool, teacher_id)
        .await?
        .filter(|t| t.is_approved)
        .ok_or_else(|| AppError::NotFound(format!("Teacher '{teacher_id}' was not found")))?;

    let commission = state.config.commission_percent;
    let quote = pricing::package_quote(
        teacher.hourly_rate,
        commission,
        campaign.lesson_count,
        campaign.discount_percent,
    )?;
    if quote.total <= Decimal::ZERO {
        return Err(AppError::Conflict("This teacher has not set a price yet".into()));
    }

    let merchant_payment_id = PaymentKind::Package.new_merchant_payment_id();
    let payment = PaymentRepo::create_package(
        &state.pool,
        &merchant_payment_id,
        &NewPackagePayment {
            student_id,
            teacher_id,
            campaign_id,
            lesson_count: campaign.lesson_count,
            amount: quote.total,
            commission_rate: commission,
        },
    )
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        %merchant_payment_id,
        %student_id,
        %teacher_id,
        lessons = campaign.lesson_count,
        amount = %quote.total,
        "Package checkout started"
    );

    let payer = require_contact(state, student_id).await?;
    let description = format!("{} - {}", campaign.name, teacher.full_name);
    open_session(
        state,
        PaymentKind::Package,
        payment.id,
        &merchant_payment_id,
        quote.total,
        &payer,
        description,
    )
    .await
}

pub async fn initiate_featured_payment(
    state: &AppState,
    teacher_id: Uuid,
    days: i32,
) -> AppResult<PaymentRedirect> {
    ProfileRepo::find_teacher(&state.pool, teacher_id)
        .await?
        .filter(|t| t.is_approved)
        .ok_or_else(|| {
            AppError::Conflict("Only approved teachers can buy featured placement".into())
        })?;

    let amount = pricing::featured_price(state.config.featured_daily_price, days)?;
    let merchant_payment_id = PaymentKind::Featured.new_merchant_payment_id();
    let payment =
        PaymentRepo::create_featured(&state.pool, &merchant_payment_id, teacher_id, days, amount)
            .await?;

    tracing::info!(
        payment_id = %payment.id,
        %merchant_payment_id,
        %teacher_id,
        days,
        amount = %amount,
        "Featured checkout started"
    );

    let payer = require_contact(state, teacher_id).await?;
    open_session(
        state,
        PaymentKind::Featured,
        payment.id,
        &merchant_payment_id,
        amount,
        &payer,
        format!("Vitrin {days} gün"),
    )
    .await
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

fn check_session_token(stored: Option<&str>, payload: &CallbackPayload) -> AppResult<()> {
    match stored {
        Some(token) if !payload.session_token.is_empty() && token != payload.session_token => {
            Err(AppError::ValidationError(
                "Callback session does not match the payment".into(),
            ))
        }
        _ => Ok(()),
    }
}

/// The parts of a locked staging row the callback pipeline needs.
struct StagedRow<'a> {
    id: Uuid,
    status: PaymentStatus,
    failure_reason: Option<&'a str>,
    session_token: Option<&'a str>,
}

/// `Some` with the stored outcome when the row was settled before this
/// callback. An approved callback for a checkout the expiry job closed
/// reopens the row so it is settled like an on-time one.
async fn settled_before(
    conn: &mut PgConnection,
    kind: PaymentKind,
    row: StagedRow<'_>,
    payload: &CallbackPayload,
) -> AppResult<Option<CallbackOutcome>> {
    let mpid = payload.merchant_payment_id.as_str();
    let late_approval = payload.is_approved()
        && row.status == PaymentStatus::Failed
        && row.failure_reason == Some(EXPIRED_REASON);

    if row.status != PaymentStatus::Pending && !late_approval {
        tracing::info!(merchant_payment_id = mpid, status = ?row.status, "Callback already processed");
        return Ok(Some(CallbackOutcome::from_status(mpid, row.status)));
    }
    check_session_token(row.session_token, payload)?;

    if late_approval {
        PaymentRepo::reopen_expired(&mut *conn, kind, row.id).await?;
        tracing::warn!(
            merchant_payment_id = mpid,
            ?kind,
            "Approved callback for an expired checkout, settling it"
        );
    }
    Ok(None)
}

pub async fn handle_callback(
    state: &AppState,
    payload: &CallbackPayload,
) -> AppResult<CallbackOutcome> {
    if !state.gateway.verify_callback(payload) {
        tracing::warn!(
            merchant_payment_id = %payload.merchant_payment_id,
            "Rejected callback with invalid signature"
        );
        return Err(AppError::ValidationError("Invalid callback signature".into()));
    }

    let kind = PaymentKind::from_merchant_payment_id(&payload.merchant_payment_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Payment '{}' was not found",
                payload.merchant_payment_id
            ))
        })?;

    tracing::info!(
        merchant_payment_id = %payload.merchant_payment_id,
        response_code = %payload.response_code,
        gateway_tx = payload.pg_tran_id.as_deref().unwrap_or("-"),
        ?kind,
        "Payment callback received"
    );

    match kind {
        PaymentKind::Lesson => confirm_lesson(state, payload).await,
        PaymentKind::Package => confirm_package(state, payload).await,
        PaymentKind::Featured => confirm_featured(state, payload).await,
    }
}

fn not_found(payload: &CallbackPayload) -> AppError {
    AppError::NotFound(format!(
        "Payment '{}' was not found",
        payload.merchant_payment_id
    ))
}

async fn confirm_lesson(state: &AppState, payload: &CallbackPayload) -> AppResult<CallbackOutcome> {
    let mpid = payload.merchant_payment_id.as_str();
    let mut tx = state.pool.begin().await?;

    let payment = PaymentRepo::find_pending(&mut *tx, mpid, true)
        .await?
        .ok_or_else(|| not_found(payload))?;

    let staged = StagedRow {
        id: payment.id,
        status: payment.status,
        failure_reason: payment.failure_reason.as_deref(),
        session_token: payment.session_token.as_deref(),
    };
    if let Some(outcome) = settled_before(&mut *tx, PaymentKind::Lesson, staged, payload).await? {
        return Ok(outcome);
    }

    if !payload.is_approved() {
        let reason = payload.failure_message();
        PaymentRepo::settle(&mut *tx, PaymentKind::Lesson, payment.id, PaymentStatus::Failed, &reason)
            .await?;
        tx.commit().await?;
        tracing::info!(merchant_payment_id = mpid, %reason, "Lesson payment failed");
        return Ok(CallbackOutcome::from_status(mpid, PaymentStatus::Failed));
    }

    let claimed = match payment.availability_id {
        Some(slot_id) => AvailabilityRepo::claim(&mut *tx, slot_id).await?,
        None => None,
    };
    let Some(slot) = claimed else {
        PaymentRepo::settle(
            &mut *tx,
            PaymentKind::Lesson,
            payment.id,
            PaymentStatus::RefundRequired,
            "slot no longer available",
        )
        .await?;
        tx.commit().await?;
        tracing::warn!(
            merchant_payment_id = mpid,
            availability_id = ?payment.availability_id,
            "Paid for a slot that was taken meanwhile, refund required"
        );
        return Ok(CallbackOutcome::from_status(mpid, PaymentStatus::RefundRequired));
    };

    let lesson = LessonRepo::create(
        &mut *tx,
        &NewLesson {
            teacher_id: payment.teacher_id,
            student_id: payment.student_id,
            availability_id: slot.id,
            package_payment_id: None,
            start_time: slot.start_time,
            end_time: slot.end_time,
            price: payment.amount,
            meeting_link: None,
        },
    )
    .await?;
    PaymentRepo::mark_lesson_paid(&mut *tx, payment.id, lesson.id).await?;
    tx.commit().await?;

    tracing::info!(
        merchant_payment_id = mpid,
        lesson_id = %lesson.id,
        "Lesson confirmed"
    );

    announce_lesson(state, lesson).await;
    Ok(CallbackOutcome::from_status(mpid, PaymentStatus::Paid))
}

async fn confirm_package(state: &AppState, payload: &CallbackPayload) -> AppResult<CallbackOutcome> {
    let mpid = payload.merchant_payment_id.as_str();
    let mut tx = state.pool.begin().await?;

    let package = PaymentRepo::find_package_by_merchant_id(&mut *tx, mpid, true)
        .await?
        .ok_or_else(|| not_found(payload))?;

    let staged = StagedRow {
        id: package.id,
        status: package.status,
        failure_reason: package.failure_reason.as_deref(),
        session_token: package.session_token.as_deref(),
    };
    if let Some(outcome) = settled_before(&mut *tx, PaymentKind::Package, staged, payload).await? {
        return Ok(outcome);
    }

    if !payload.is_approved() {
        let reason = payload.failure_message();
        PaymentRepo::settle(&mut *tx, PaymentKind::Package, package.id, PaymentStatus::Failed, &reason)
            .await?;
        tx.commit().await?;
        tracing::info!(merchant_payment_id = mpid, %reason, "Package payment failed");
        return Ok(CallbackOutcome::from_status(mpid, PaymentStatus::Failed));
    }

    PaymentRepo::mark_package_paid(&mut *tx, package.id).await?;
    tx.commit().await?;

    tracing::info!(
        merchant_payment_id = mpid,
        package_id = %package.id,
        lessons = package.lesson_count,
        "Package activated"
    );

    let (student, teacher) = tokio::join!(
        ProfileRepo::contact(&state.pool, package.student_id),
        ProfileRepo::contact(&state.pool, package.teacher_id),
    );
    match (student, teacher) {
        (Ok(Some(student)), Ok(Some(teacher))) => {
            state
                .notifier
                .email_best_effort(templates::package_purchased(
                    &student.email,
                    &student.full_name,
                    &teacher.full_name,
                    package.lesson_count,
                    package.amount,
                ))
                .await;
        }
        _ => tracing::warn!(package_id = %package.id, "Could not load contacts for package email"),
    }

    Ok(CallbackOutcome::from_status(mpid, PaymentStatus::Paid))
}

async fn confirm_featured(state: &AppState, payload: &CallbackPayload) -> AppResult<CallbackOutcome> {
    let mpid = payload.merchant_payment_id.as_str();
    let mut tx = state.pool.begin().await?;

    let featured = PaymentRepo::find_featured_by_merchant_id(&mut *tx, mpid, true)
        .await?
        .ok_or_else(|| not_found(payload))?;

    let staged = StagedRow {
        id: featured.id,
        status: featured.status,
        failure_reason: featured.failure_reason.as_deref(),
        session_token: featured.session_token.as_deref(),
    };
    if let Some(outcome) = settled_before(&mut *tx, PaymentKind::Featured, staged, payload).await? {
        return Ok(outcome);
    }

    if !payload.is_approved() {
        let reason = payload.failure_message();
        PaymentRepo::settle(&mut *tx, PaymentKind::Featured, featured.id, PaymentStatus::Failed, &reason)
            .await?;
        tx.commit().await?;
        tracing::info!(merchant_payment_id = mpid, %reason, "Featured payment failed");
        return Ok(CallbackOutcome::from_status(mpid, PaymentStatus::Failed));
    }

    let teacher = ProfileRepo::find_teacher_for_update(&mut *tx, featured.teacher_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Teacher '{}' was not found", featured.teacher_id)))?;

    let (starts_at, ends_at) =
        scheduling::featured_period(Utc::now(), teacher.featured_until, featured.days);
    ProfileRepo::set_featured_until(&mut *tx, teacher.user_id, ends_at).await?;
    PaymentRepo::mark_featured_paid(&mut *tx, featured.id, starts_at, ends_at).await?;
    tx.commit().await?;

    tracing::info!(
        merchant_payment_id = mpid,
        teacher_id = %teacher.user_id,
        %starts_at,
        %ends_at,
        "Featured placement activated"
    );

    match ProfileRepo::contact(&state.pool, teacher.user_id).await {
        Ok(Some(contact)) => {
            state
                .notifier
                .email_best_effort(templates::featured_activated(
                    &contact.email,
                    &contact.full_name,
                    starts_at,
                    ends_at,
                ))
                .await;
        }
        Ok(None) => tracing::warn!(teacher_id = %teacher.user_id, "Teacher contact missing"),
        Err(e) => tracing::error!(error = %e, "Could not load teacher contact"),
    }

    Ok(CallbackOutcome::from_status(mpid, PaymentStatus::Paid))
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

pub async fn book_with_package(
    state: &AppState,
    student_id: Uuid,
    package_id: Uuid,
    availability_id: Uuid,
) -> AppResult<Lesson> {
    let mut tx = state.pool.begin().await?;

    let package = PaymentRepo::find_package(&mut *tx, package_id, true)
        .await?
        .filter(|p| p.student_id == student_id)
        .ok_or_else(|| AppError::NotFound(format!("Package '{package_id}' was not found")))?;

    if package.status != PaymentStatus::Paid {
        return Err(AppError::Conflict("This package is not active".into()));
    }
    if package.lessons_remaining <= 0 {
        return Err(AppError::Conflict("No lessons left in this package".into()));
    }

    let slot = AvailabilityRepo::find(&mut *tx, availability_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Slot '{availability_id}' was not found")))?;
    if slot.teacher_id != package.teacher_id {
        return Err(AppError::ValidationError(
            "This slot belongs to a different teacher".into(),
        ));
    }

    let slot = AvailabilityRepo::claim(&mut *tx, slot.id)
        .await?
        .ok_or_else(|| AppError::Conflict("This slot is no longer available".into()))?;

    if !PaymentRepo::take_package_credit(&mut *tx, package.id).await? {
        return Err(AppError::Conflict("No lessons left in this package".into()));
    }

    let price = pricing::per_lesson_share(package.amount, package.lesson_count)?;
    let lesson = LessonRepo::create(
        &mut *tx,
        &NewLesson {
            teacher_id: package.teacher_id,
            student_id,
            availability_id: slot.id,
            package_payment_id: Some(package.id),
            start_time: slot.start_time,
            end_time: slot.end_time,
            price,
            meeting_link: None,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        package_id = %package.id,
        lesson_id = %lesson.id,
        remaining = package.lessons_remaining - 1,
        "Lesson booked from package"
    );

    Ok(announce_lesson(state, lesson).await)
}

/// Attach a meeting room and send both confirmation emails.
async fn announce_lesson(state: &AppState, mut lesson: Lesson) -> Lesson {
    lesson.meeting_link = lessons::attach_meeting_link(state, &lesson).await;
    lessons::notify_participants(state, &lesson, lessons::LessonNotice::Confirmed).await;
    lesson
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(token: &str) -> CallbackPayload {
        CallbackPayload {
            merchant_payment_id: "LSN-1".into(),
            response_code: "00".into(),
            response_msg: None,
            session_token: token.into(),
            pg_tran_id: None,
            hash: String::new(),
        }
    }

    #[test]
    fn outcome_redirects() {
        let ok = CallbackOutcome::from_status("LSN-1", PaymentStatus::Paid);
        assert_eq!(
            ok.redirect_url("https://edupremium.com.tr"),
            "https://edupremium.com.tr/payment/success?ref=LSN-1"
        );

        for status in [
            PaymentStatus::Failed,
            PaymentStatus::RefundRequired,
            PaymentStatus::Pending,
        ] {
            let outcome = CallbackOutcome::from_status("LSN-1", status);
            assert!(outcome.redirect_url("http://x").ends_with("/payment/failure?ref=LSN-1"));
        }
    }

    #[test]
    fn session_token_mismatch_is_rejected() {
        assert!(check_session_token(Some("abc"), &payload("abc")).is_ok());
        assert!(check_session_token(Some("abc"), &payload("")).is_ok());
        assert!(check_session_token(None, &payload("xyz")).is_ok());
        assert!(matches!(
            check_session_token(Some("abc"), &payload("xyz")),
            Err(AppError::ValidationError(_))
        ));
    }
}

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::domain::pricing;
use crate::models::payment::{PaymentKind, PaymentListFilter, RevenueTotals};
use crate::repositories::{LessonRepo, PaymentRepo, ProfileRepo, UserRepo};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{empty_success, success};

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: BTreeMap<&'static str, i64>,
    pub lessons: BTreeMap<&'static str, i64>,
    pub revenue: RevenueTotals,
}

pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> AppResult<Response> {
    let (users, lessons, revenue) = tokio::try_join!(
        UserRepo::count_by_role(&state.pool),
        LessonRepo::count_by_status(&state.pool),
        PaymentRepo::paid_amounts(&state.pool),
    )?;
    let revenue = pricing::revenue_totals(&revenue)?;

    let stats = DashboardStats {
        users: users
            .into_iter()
            .map(|(role, count)| (role.as_str(), count))
            .collect(),
        lessons: lessons
            .into_iter()
            .map(|(status, count)| (status.as_str(), count))
            .collect(),
        revenue,
    };
    Ok(success(stats, "Dashboard stats"))
}

pub async fn list_payments(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(filter): Query<PaymentListFilter>,
) -> AppResult<Response> {
    let payments = PaymentRepo::list(&state.pool, &filter).await?;
    Ok(success(payments, "Payments retrieved"))
}

pub async fn pending_teachers(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> AppResult<Response> {
    let teachers = ProfileRepo::list_unapproved_teachers(&state.pool).await?;
    Ok(success(teachers, "Teachers awaiting approval"))
}

pub async fn approve_teacher(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(teacher_id): Path<Uuid>,
) -> AppResult<Response> {
    let teacher = ProfileRepo::set_approved(&state.pool, teacher_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Teacher '{teacher_id}' was not found")))?;
    tracing::info!(%teacher_id, approved_by = %admin.user_id, "Teacher approved");
    Ok(success(teacher, "Teacher approved"))
}

pub async fn mark_refunded(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((kind, payment_id)): Path<(PaymentKind, Uuid)>,
) -> AppResult<Response> {
    if !PaymentRepo::mark_refunded(&state.pool, kind, payment_id).await? {
        return Err(AppError::Conflict(
            "Payment is not awaiting a refund".into(),
        ));
    }
    tracing::info!(%payment_id, ?kind, refunded_by = %admin.user_id, "Payment marked refunded");
    Ok(empty_success("Payment marked as refunded"))
}

use axum::extract::{Path, State};
use axum::response::{Redirect, Response};
use axum::{Form, Json};
use uuid::Uuid;

use crate::auth::{RequireStudent, RequireTeacher};
use crate::models::payment::{
    BookWithPackage, InitiateFeaturedPayment, InitiateLessonPayment, InitiatePackagePayment,
};
use crate::repositories::PaymentRepo;
use crate::services::gateway::CallbackPayload;
use crate::services::payments;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::response::{created, success};

pub async fn initiate_lesson(
    State(state): State<AppState>,
    RequireStudent(auth): RequireStudent,
    Json(input): Json<InitiateLessonPayment>,
) -> AppResult<Response> {
    let redirect =
        payments::initiate_lesson_payment(&state, auth.user_id, input.availability_id).await?;
    Ok(created(redirect, "Payment session created"))
}

pub async fn initiate_package(
    State(state): State<AppState>,
    RequireStudent(auth): RequireStudent,
    Json(input): Json<InitiatePackagePayment>,
) -> AppResult<Response> {
    let redirect = payments::initiate_package_payment(
        &state,
        auth.user_id,
        input.teacher_id,
        input.campaign_id,
    )
    .await?;
    Ok(created(redirect, "Payment session created"))
}

pub async fn initiate_featured(
    State(state): State<AppState>,
    RequireTeacher(auth): RequireTeacher,
    Json(input): Json<InitiateFeaturedPayment>,
) -> AppResult<Response> {
    let redirect = payments::initiate_featured_payment(&state, auth.user_id, input.days).await?;
    Ok(created(redirect, "Payment session created"))
}

/// Gateway return URL. The customer's browser is sent on to the frontend
/// result page.
pub async fn callback(
    State(state): State<AppState>,
    Form(payload): Form<CallbackPayload>,
) -> AppResult<Redirect> {
    let outcome = payments::handle_callback(&state, &payload).await?;
    Ok(Redirect::to(&outcome.redirect_url(&state.config.frontend_url)))
}

pub async fn list_packages(
    State(state): State<AppState>,
    RequireStudent(auth): RequireStudent,
) -> AppResult<Response> {
    let packages = PaymentRepo::list_packages_for_student(&state.pool, auth.user_id).await?;
    Ok(success(packages, "Packages retrieved"))
}

pub async fn book_with_package(
    State(state): State<AppState>,
    RequireStudent(auth): RequireStudent,
    Path(package_id): Path<Uuid>,
    Json(input): Json<BookWithPackage>,
) -> AppResult<Response> {
    let lesson =
        payments::book_with_package(&state, auth.user_id, package_id, input.availability_id)
            .await?;
    Ok(created(lesson, "Lesson booked"))
}

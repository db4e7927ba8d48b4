use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::RequireTeacher;
use crate::domain::scheduling::validate_slot;
use crate::models::availability::{AvailabilityRange, CreateAvailability};
use crate::repositories::{AvailabilityRepo, ProfileRepo};
use crate::services::payments::CHECKOUT_HOLD_MINUTES;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{created, empty_success, success};

/// Public listings look this far ahead when no range is given.
const DEFAULT_RANGE_DAYS: i64 = 30;

pub async fn create_slot(
    State(state): State<AppState>,
    RequireTeacher(auth): RequireTeacher,
    Json(input): Json<CreateAvailability>,
) -> AppResult<Response> {
    validate_slot(input.start_time, input.end_time, Utc::now())?;

    let mut tx = state.pool.begin().await?;
    // Serializes concurrent slot creation for the same teacher.
    ProfileRepo::find_teacher_for_update(&mut *tx, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher profile not found".into()))?;

    if AvailabilityRepo::has_overlap(&mut *tx, auth.user_id, input.start_time, input.end_time)
        .await?
    {
        return Err(AppError::Conflict(
            "Slot overlaps an existing slot".into(),
        ));
    }
    let slot =
        AvailabilityRepo::create(&mut *tx, auth.user_id, input.start_time, input.end_time).await?;
    tx.commit().await?;

    tracing::info!(slot_id = %slot.id, teacher_id = %auth.user_id, "Availability slot created");
    Ok(created(slot, "Slot created"))
}

pub async fn list_my_slots(
    State(state): State<AppState>,
    RequireTeacher(auth): RequireTeacher,
) -> AppResult<Response> {
    let slots = AvailabilityRepo::list_for_teacher(&state.pool, auth.user_id, Utc::now()).await?;
    Ok(success(slots, "Slots retrieved"))
}

pub async fn list_open_slots(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
    Query(range): Query<AvailabilityRange>,
) -> AppResult<Response> {
    let from = range.from.unwrap_or_else(Utc::now);
    let to = range
        .to
        .unwrap_or_else(|| from + Duration::days(DEFAULT_RANGE_DAYS));
    if to <= from {
        return Err(AppError::ValidationError("'to' must be after 'from'".into()));
    }

    let slots = AvailabilityRepo::list_open(&state.pool, teacher_id, from, to).await?;
    Ok(success(slots, "Slots retrieved"))
}

pub async fn delete_slot(
    State(state): State<AppState>,
    RequireTeacher(auth): RequireTeacher,
    Path(slot_id): Path<Uuid>,
) -> AppResult<Response> {
    let held_since = Utc::now() - Duration::minutes(CHECKOUT_HOLD_MINUTES);
    if AvailabilityRepo::delete_free(&state.pool, slot_id, auth.user_id, held_since).await? == 1 {
        tracing::info!(%slot_id, "Availability slot deleted");
        return Ok(empty_success("Slot deleted"));
    }

    match AvailabilityRepo::find(&state.pool, slot_id).await? {
        Some(slot) if slot.teacher_id == auth.user_id && slot.is_booked => {
            Err(AppError::Conflict("Booked slots cannot be deleted".into()))
        }
        Some(slot) if slot.teacher_id == auth.user_id => Err(AppError::Conflict(
            "A student is paying for this slot, try again later".into(),
        )),
        _ => Err(AppError::NotFound(format!("Slot '{slot_id}' was not found"))),
    }
}

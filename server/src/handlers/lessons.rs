use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::lesson::LessonFilter;
use crate::repositories::LessonRepo;
use crate::services::lessons;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::response::success;

#[derive(Serialize)]
struct MeetingLink {
    url: String,
}

pub async fn list_lessons(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<LessonFilter>,
) -> AppResult<Response> {
    let lessons = LessonRepo::list_for_user(&state.pool, auth.user_id, auth.role, &filter).await?;
    Ok(success(lessons, "Lessons retrieved"))
}

pub async fn get_lesson(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(lesson_id): Path<Uuid>,
) -> AppResult<Response> {
    let lesson = lessons::find_visible(&state, auth, lesson_id).await?;
    Ok(success(lesson, "Lesson retrieved"))
}

pub async fn cancel_lesson(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(lesson_id): Path<Uuid>,
) -> AppResult<Response> {
    let lesson = lessons::cancel_lesson(&state, auth, lesson_id).await?;
    Ok(success(lesson, "Lesson cancelled"))
}

pub async fn complete_lesson(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(lesson_id): Path<Uuid>,
) -> AppResult<Response> {
    let lesson = lessons::complete_lesson(&state, auth, lesson_id).await?;
    Ok(success(lesson, "Lesson completed"))
}

pub async fn meeting_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(lesson_id): Path<Uuid>,
) -> AppResult<Response> {
    let url = lessons::meeting_link(&state, auth, lesson_id).await?;
    Ok(success(MeetingLink { url }, "Meeting link retrieved"))
}

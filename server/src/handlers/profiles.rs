use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthUser, RequireStudent, RequireTeacher};
use crate::domain::pricing::gross_price;
use crate::models::profile::{
    StudentProfile, TeacherListing, TeacherProfile, UpdateStudentProfile, UpdateTeacherProfile,
};
use crate::models::user::Role;
use crate::repositories::ProfileRepo;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::success;

#[derive(Debug, Serialize)]
#[serde(tag = "role", content = "profile", rename_all = "lowercase")]
pub enum MyProfile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
}

#[derive(Debug, Deserialize)]
pub struct TeacherQuery {
    pub branch: Option<String>,
}

pub(crate) fn listing(teacher: TeacherProfile, commission_percent: Decimal) -> AppResult<TeacherListing> {
    let is_featured = teacher.is_featured_at(Utc::now());
    Ok(TeacherListing {
        hourly_price: gross_price(teacher.hourly_rate, commission_percent)?,
        user_id: teacher.user_id,
        full_name: teacher.full_name,
        bio: teacher.bio,
        branch: teacher.branch,
        subjects: teacher.subjects,
        is_featured,
    })
}

fn not_blank(field: &str, value: Option<&str>) -> AppResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(AppError::ValidationError(format!(
            "{field} must not be empty"
        ))),
        _ => Ok(()),
    }
}

pub async fn get_my_profile(State(state): State<AppState>, auth: AuthUser) -> AppResult<Response> {
    let profile = match auth.role {
        Role::Student => ProfileRepo::find_student(&state.pool, auth.user_id)
            .await?
            .map(MyProfile::Student),
        Role::Teacher => ProfileRepo::find_teacher(&state.pool, auth.user_id)
            .await?
            .map(MyProfile::Teacher),
        Role::Admin => None,
    };
    let profile = profile.ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    Ok(success(profile, "Profile retrieved"))
}

pub async fn update_student_profile(
    State(state): State<AppState>,
    RequireStudent(auth): RequireStudent,
    Json(input): Json<UpdateStudentProfile>,
) -> AppResult<Response> {
    not_blank("full_name", input.full_name.as_deref())?;

    let profile = ProfileRepo::update_student(&state.pool, auth.user_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    Ok(success(profile, "Profile updated"))
}

pub async fn update_teacher_profile(
    State(state): State<AppState>,
    RequireTeacher(auth): RequireTeacher,
    Json(input): Json<UpdateTeacherProfile>,
) -> AppResult<Response> {
    not_blank("full_name", input.full_name.as_deref())?;
    if input.hourly_rate.is_some_and(|rate| rate < Decimal::ZERO) {
        return Err(AppError::ValidationError(
            "hourly_rate must not be negative".into(),
        ));
    }

    let profile = ProfileRepo::update_teacher(&state.pool, auth.user_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    tracing::info!(teacher_id = %auth.user_id, "Teacher profile updated");
    Ok(success(profile, "Profile updated"))
}

pub async fn list_teachers(
    State(state): State<AppState>,
    Query(query): Query<TeacherQuery>,
) -> AppResult<Response> {
    let branch = query.branch.as_deref().map(str::trim).filter(|b| !b.is_empty());
    let teachers = ProfileRepo::list_approved_teachers(&state.pool, branch).await?;
    let listings = teachers
        .into_iter()
        .map(|t| listing(t, state.config.commission_percent))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(success(listings, "Teachers retrieved"))
}

pub async fn get_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
) -> AppResult<Response> {
    let teacher = ProfileRepo::find_teacher(&state.pool, teacher_id)
        .await?
        .filter(|t| t.is_approved)
        .ok_or_else(|| AppError::NotFound(format!("Teacher '{teacher_id}' was not found")))?;
    Ok(success(
        listing(teacher, state.config.commission_percent)?,
        "Teacher retrieved",
    ))
}

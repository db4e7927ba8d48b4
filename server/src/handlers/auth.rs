use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::AuthUser;
use crate::domain::policy::dashboard_target;
use crate::models::user::{Role, User};
use crate::repositories::{ProfileRepo, UserRepo};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
    pub redirect_to: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub redirect_to: &'static str,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(input: &RegisterRequest) -> AppResult<()> {
    let email = input.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(AppError::ValidationError("A valid email is required".into()));
    }
    if input.full_name.trim().is_empty() {
        return Err(AppError::ValidationError("Full name is required".into()));
    }
    if input.role == Role::Admin {
        return Err(AppError::ValidationError(
            "Role must be student or teacher".into(),
        ));
    }
    validate_password_strength(&input.password).map_err(AppError::ValidationError)
}

/// Where the user should land, based on their profile state.
async fn landing(state: &AppState, user: &User) -> AppResult<&'static str> {
    let profile = match user.role {
        Role::Admin => None,
        Role::Teacher => ProfileRepo::find_teacher(&state.pool, user.id)
            .await?
            .map(|t| t.is_approved),
        Role::Student => ProfileRepo::find_student(&state.pool, user.id)
            .await?
            .map(|_| true),
    };
    Ok(dashboard_target(user.role, profile))
}

fn issue_token(state: &AppState, user: &User) -> AppResult<String> {
    generate_access_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiry_mins,
    )
    .map_err(|e| AppError::InternalServerError(format!("token signing failed: {e}")))
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<Response> {
    validate_registration(&input)?;
    let email = normalize_email(&input.email);

    if UserRepo::email_exists(&state.pool, &email).await? {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalServerError(format!("password hashing failed: {e}")))?;

    let mut tx = state.pool.begin().await?;
    let user = UserRepo::create(&mut *tx, &email, &password_hash, input.role).await?;
    let full_name = input.full_name.trim();
    match user.role {
        Role::Student => {
            ProfileRepo::create_student(&mut *tx, user.id, full_name).await?;
        }
        Role::Teacher => {
            ProfileRepo::create_teacher(&mut *tx, user.id, full_name).await?;
        }
        Role::Admin => {
            return Err(AppError::ValidationError(
                "Role must be student or teacher".into(),
            ))
        }
    }
    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

    let access_token = issue_token(&state, &user)?;
    let redirect_to = landing(&state, &user).await?;
    Ok(created(
        AuthResponse {
            access_token,
            token_type: "Bearer",
            user,
            redirect_to,
        },
        "Registration successful",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Response> {
    let invalid = || AppError::AuthError("Invalid email or password".into());

    let user = UserRepo::find_by_email(&state.pool, &normalize_email(&input.email))
        .await?
        .ok_or_else(invalid)?;

    let matches = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("stored hash is invalid: {e}")))?;
    if !matches {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(invalid());
    }

    let access_token = issue_token(&state, &user)?;
    let redirect_to = landing(&state, &user).await?;
    Ok(success(
        AuthResponse {
            access_token,
            token_type: "Bearer",
            user,
            redirect_to,
        },
        "Login successful",
    ))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Response> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".into()))?;
    let redirect_to = landing(&state, &user).await?;
    Ok(success(MeResponse { user, redirect_to }, "Current user"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            full_name: "Ayşe Yılmaz".into(),
            role,
        }
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration(&request("ayse@example.com", "s3cure-pass", Role::Student)).is_ok());
        assert!(validate_registration(&request("not-an-email", "s3cure-pass", Role::Student)).is_err());
        assert!(validate_registration(&request("ayse@example.com", "short", Role::Teacher)).is_err());
        assert!(validate_registration(&request("ayse@example.com", "s3cure-pass", Role::Admin)).is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ayse@Example.COM "), "ayse@example.com");
    }
}

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::extract::CurrentUser;
use crate::auth::{AuthUser, Session, SignUp};
use crate::errors::AppError;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

fn require_email(email: &str) -> Result<&str, AppError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("A valid email address is required".into())),
    }
}

fn require_password(password: &str) -> Result<&str, AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(password)
}

/// POST /api/v1/auth/signin
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Session>, AppError> {
    let email = require_email(&req.email)?;
    if req.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }
    Ok(Json(state.auth.sign_in(email, &req.password).await?))
}

/// POST /api/v1/auth/signup
pub async fn handle_sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUp>), AppError> {
    let email = require_email(&req.email)?;
    let password = require_password(&req.password)?;
    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("Full name is required".into()));
    }
    let signup = state.auth.sign_up(email, password, full_name).await?;
    Ok((StatusCode::CREATED, Json(signup)))
}

/// POST /api/v1/auth/signout
pub async fn handle_sign_out(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.auth.sign_out(&current.access_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/password/reset
///
/// Always 202 for a well-formed address so the response does not reveal
/// which emails have accounts.
pub async fn handle_password_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let email = require_email(&req.email)?;
    if let Err(e) = state.auth.reset_password(email).await {
        tracing::warn!("Password reset request failed: {e}");
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "If an account exists, a reset link has been sent." })),
    ))
}

/// POST /api/v1/auth/password/update
pub async fn handle_password_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<AuthUser>, AppError> {
    let password = require_password(&req.password)?;
    Ok(Json(
        state
            .auth
            .update_password(&current.access_token, password)
            .await?,
    ))
}

/// GET /api/v1/auth/session
pub async fn handle_session(current: CurrentUser) -> Json<Value> {
    Json(json!({ "user": current.user }))
}

use axum::{extract::State, Json};

use crate::auth::extract::CurrentUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::usage::TokenUsage;

/// GET /api/v1/usage
pub async fn handle_get_usage(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<TokenUsage>, AppError> {
    let used = state.usage.used_tokens(current.user.id).await?;
    Ok(Json(TokenUsage::new(used, state.config.token_budget)))
}

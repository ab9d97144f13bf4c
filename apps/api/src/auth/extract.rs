use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;

/// The signed-in user behind a request. Extracting it is what makes a route
/// protected: no bearer token, or one the auth service rejects, is a 401.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: AuthUser,
    pub access_token: String,
}

pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let user = state.auth.get_user(&token).await?;
        Ok(CurrentUser {
            user,
            access_token: token,
        })
    }
}

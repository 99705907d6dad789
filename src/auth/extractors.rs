use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::services::authenticate;
use crate::{error::AppError, state::AppState};

/// Authenticated caller: the bearer passed signature, expiry and session checks.
pub struct AuthUser {
    pub user_id: i64,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let user_id = authenticate(state, token).await?;
        Ok(AuthUser {
            user_id,
            token: token.to_string(),
        })
    }
}

//! Bearer session authentication extractor.
//!
//! Extracts the session token from `Authorization: Bearer <token>` and
//! resolves it against the `auth_sessions` table (tokens are stored as
//! SHA-256 digests).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use corkboard_core::identity::resolve_display_name;
use corkboard_types::identity::AuthUser;

use crate::http::error::AppError;
use crate::state::AppState;

/// The signed-in caller. Extracting this validates the session token.
pub struct CurrentUser {
    pub user: AuthUser,
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)?;
        match state.accounts.resolve_session(&token).await? {
            Some(user) => Ok(CurrentUser { user, token }),
            None => Err(AppError::Unauthorized(
                "Invalid or expired session. Sign in again to get a new token.".to_string(),
            )),
        }
    }
}

impl CurrentUser {
    /// Display name held on the session. Sessions issued without one
    /// resolve it from the profile once and keep it.
    pub async fn display_name(&self, state: &AppState) -> Result<String, AppError> {
        if let Some(name) = &self.user.display_name {
            return Ok(name.clone());
        }
        let name = resolve_display_name(&state.profiles_for(None), &self.user.id).await;
        state.accounts.cache_display_name(&self.token, &name).await?;
        Ok(name)
    }
}

/// Extract the session token from the `Authorization` header.
fn extract_bearer(parts: &Parts) -> Result<String, AppError> {
    let Some(auth) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(AppError::Unauthorized(
            "Missing session token. Provide it via 'Authorization: Bearer <token>'.".to_string(),
        ));
    };
    let auth_str = auth
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
    match auth_str.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(AppError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}

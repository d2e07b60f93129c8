//! Account and session handlers.
//!
//! Each successful sign-in issues a fresh bearer token. Profiles are written
//! through a store scoped to the new principal, so a caller can only ever
//! create its own `users/{id}` document.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use corkboard_core::event::Notifier;
use corkboard_core::identity::{ensure_profile, pick_username, resolve_display_name};
use corkboard_core::repository::ProfileStore;
use corkboard_infra::auth::external_user;
use corkboard_types::error::AuthError;
use corkboard_types::event::Notification;
use corkboard_types::identity::{AuthUser, Credentials, ExternalAssertion, PrincipalId, Profile};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Desired display name; a generated one is used when blank or absent.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: PrincipalId,
    pub email: Option<String>,
    pub display_name: String,
}

impl UserView {
    fn new(user: &AuthUser, display_name: String) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub token: String,
    pub user: UserView,
}

/// POST /api/v1/auth/register - Create an account and its profile.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionView>>), AppError> {
    let timer = RequestTimer::start();
    let credentials = Credentials::new(body.email, body.password);

    let user = state.accounts.create_account(&credentials).await?;
    let profile = Profile {
        username: pick_username(body.username.as_deref()),
        email: user.email.clone().unwrap_or_else(|| credentials.email.clone()),
        created_at: Utc::now(),
    };
    state
        .profiles_for(Some(user.id.clone()))
        .put_profile(&user.id, &profile)
        .await
        .map_err(AuthError::from)?;
    let token = state
        .accounts
        .issue_session(&with_name(&user, &profile.username))
        .await?;

    tracing::info!(principal = %user.id, username = %profile.username, "account registered");
    state
        .notifications
        .notify(Notification::success("Account created successfully!"));

    let resp = timer
        .success(SessionView {
            token,
            user: UserView::new(&user, profile.username),
        })
        .with_link("me", "/api/v1/auth/me");
    Ok((StatusCode::CREATED, Json(resp)))
}

/// POST /api/v1/auth/login - Sign in with email and password.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let timer = RequestTimer::start();
    let user = state
        .accounts
        .verify_credentials(&Credentials::new(body.email, body.password))
        .await?;
    let display_name = resolve_display_name(&state.profiles_for(None), &user.id).await;
    let token = state
        .accounts
        .issue_session(&with_name(&user, &display_name))
        .await?;

    tracing::info!(principal = %user.id, "signed in");
    Ok(Json(timer.success(SessionView {
        token,
        user: UserView::new(&user, display_name),
    })))
}

/// POST /api/v1/auth/external - Sign in with an external provider assertion.
///
/// First-time principals get a profile named after the provider's display
/// name (or a generated one); returning principals keep theirs.
pub async fn login_external(
    State(state): State<AppState>,
    Json(assertion): Json<ExternalAssertion>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let timer = RequestTimer::start();
    let user = external_user(&assertion)?;
    let profile = ensure_profile(&state.profiles_for(Some(user.id.clone())), &user, None)
        .await
        .map_err(AuthError::from)?;
    let token = state
        .accounts
        .issue_session(&with_name(&user, &profile.username))
        .await?;

    tracing::info!(principal = %user.id, provider = %assertion.provider, "signed in externally");
    Ok(Json(timer.success(SessionView {
        token,
        user: UserView::new(&user, profile.username),
    })))
}

/// POST /api/v1/auth/logout - Revoke the caller's session token.
pub async fn logout(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    let revoked = state.accounts.revoke_session(&caller.token).await?;
    tracing::info!(principal = %caller.user.id, "signed out");
    Ok(Json(timer.success(serde_json::json!({ "revoked": revoked }))))
}

/// GET /api/v1/auth/me - Who the bearer token belongs to.
pub async fn me(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<ApiResponse<UserView>>, AppError> {
    let timer = RequestTimer::start();
    let display_name = caller.display_name(&state).await?;
    Ok(Json(timer.success(UserView::new(&caller.user, display_name))))
}

/// The session's author name is fixed when it is issued.
fn with_name(user: &AuthUser, display_name: &str) -> AuthUser {
    AuthUser {
        display_name: Some(display_name.to_string()),
        ..user.clone()
    }
}

//! Authentication route handlers.
//!
//! Email/password registration and login. A successful login stores
//! [`CurrentUser`] in the session; cart and uploads carry over.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::session::CurrentUser;
use crate::models::user::User;
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session state returned by the auth endpoints.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: Option<CurrentUser>,
}

async fn start_session(session: &Session, user: User) -> Result<AuthResponse> {
    let current = CurrentUser {
        id: user.id,
        email: user.email,
    };
    set_current_user(session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    Ok(AuthResponse {
        success: true,
        user: Some(current),
    })
}

/// Create an account and log in.
///
/// POST /api/auth/register
#[instrument(skip(state, session, registration))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let user = AuthService::new(state.pool()).register(&registration).await?;
    tracing::info!(user_id = %user.id, "User registered");

    let response = start_session(&session, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = AuthService::new(state.pool())
        .login(&request.email, &request.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    Ok(Json(start_session(&session, user).await?))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(OptionalAuth(user): OptionalAuth) -> Json<AuthResponse> {
    Json(AuthResponse {
        success: user.is_some(),
        user,
    })
}

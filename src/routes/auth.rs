/**
 * Authentication Routes
 * Session-cookie login, registration, logout and current-user lookups
 */
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{self, SessionUser};
use crate::error::{ApiError, ValidJson};
use crate::models::{Credentials, NewUser, PublicUser};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusResponse {
    pub is_authenticated: bool,
    pub is_admin: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/register
/// Creates a customer account and logs it in.
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    if state
        .storage
        .get_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Username already exists".to_string()));
    }

    let password_hash = auth::hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .storage
        .create_user(NewUser {
            username: payload.username,
            password_hash,
            is_admin: false,
        })
        .await?;

    let cookie = auth::start_session(&state, user.id).await?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(PublicUser::from(&user)),
    ))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(user) = state
        .storage
        .get_user_by_username(&payload.username)
        .await?
    else {
        tracing::warn!(username = %payload.username, "login attempt for unknown user");
        return Err(ApiError::InvalidCredentials);
    };

    if !auth::verify_password(payload.password, user.password.clone()).await {
        tracing::warn!(username = %user.username, "failed login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let cookie = auth::start_session(&state, user.id).await?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(([(header::SET_COOKIE, cookie)], Json(PublicUser::from(&user))))
}

/// POST /api/logout
/// Always succeeds; the cookie is cleared even when no session existed.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = auth::end_session(&state, &headers).await {
        tracing::warn!(error = %e, "failed to destroy session on logout");
    }
    (
        [(
            header::SET_COOKIE,
            auth::clear_session_cookie(state.config.is_production()),
        )],
        Json(LogoutResponse { success: true }),
    )
}

/// GET /api/user
pub async fn current_user(SessionUser(user): SessionUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}

/// GET /api/admin/status
pub async fn admin_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminStatusResponse>, ApiError> {
    let user = auth::current_user(&state, &headers).await?;
    Ok(Json(AdminStatusResponse {
        is_authenticated: user.is_some(),
        is_admin: user.is_some_and(|u| u.is_admin),
    }))
}

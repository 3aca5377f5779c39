//! Session authentication.
//!
//! Login hands out a random token in an `HttpOnly` cookie and stores only its
//! SHA-256 hash in a [`SessionStore`]. Handlers ask for [`SessionUser`] or
//! [`AdminUser`] to require a logged-in user or an admin.

pub mod session;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::{NewUser, User};
use crate::state::AppState;
use crate::storage::{Storage, StorageError};

pub use session::{spawn_session_pruner, MemorySessionStore, PgSessionStore, SessionStore};

pub const SESSION_COOKIE: &str = "storefront.sid";

const SESSION_TOKEN_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("ADMIN_PASSWORD_HASH is not a bcrypt hash; generate one with the hash-password binary")]
    InvalidAdminHash,
}

// ============================================================================
// Passwords
// ============================================================================

pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.starts_with("$2")
}

/// bcrypt is CPU-bound; run it off the async executor.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

/// Only bcrypt hashes ever verify. Plain-text rows are migrated at startup,
/// never compared at login.
pub async fn verify_password(password: String, stored: String) -> bool {
    if !is_bcrypt_hash(&stored) {
        return false;
    }
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// Admin account described by the configuration, with its password hashed.
/// A configured hash that is not bcrypt could never verify, so it is rejected.
pub async fn admin_account(config: &AppConfig) -> Result<NewUser, AuthError> {
    let password_hash = match &config.admin_password_hash {
        Some(hash) if is_bcrypt_hash(hash) => hash.clone(),
        Some(_) => return Err(AuthError::InvalidAdminHash),
        None => hash_password(config.admin_password.clone(), config.bcrypt_cost).await?,
    };
    Ok(NewUser {
        username: config.admin_username.clone(),
        password_hash,
        is_admin: true,
    })
}

/// Creates the admin user unless a user with that name already exists.
pub async fn ensure_admin(storage: &dyn Storage, admin: NewUser) -> Result<User, StorageError> {
    if let Some(existing) = storage.get_user_by_username(&admin.username).await? {
        if !existing.is_admin {
            tracing::warn!(
                username = %existing.username,
                "configured admin username belongs to a non-admin user"
            );
        }
        return Ok(existing);
    }
    let user = storage.create_user(admin).await?;
    tracing::info!(username = %user.username, "created admin user");
    Ok(user)
}

// ============================================================================
// Session tokens and cookies
// ============================================================================

pub fn generate_session_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), SESSION_TOKEN_LEN)
}

/// Hex SHA-256 of a session token, the key under which sessions are stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Session token from the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Opens a session for the user and returns the `Set-Cookie` value.
pub async fn start_session(state: &AppState, user_id: i32) -> Result<String, ApiError> {
    let token = generate_session_token();
    let ttl = state.config.session_ttl;
    let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
    state
        .sessions
        .create(&hash_token(&token), user_id, expires_at)
        .await?;
    Ok(session_cookie(
        &token,
        ttl.as_secs(),
        state.config.is_production(),
    ))
}

/// Drops the request's session, if it carries one.
pub async fn end_session(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(token) = session_token(headers) {
        state.sessions.destroy(&hash_token(&token)).await?;
    }
    Ok(())
}

/// User behind the request's session cookie.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    let Some(session) = state.sessions.get(&hash_token(&token)).await? else {
        return Ok(None);
    };
    Ok(state.storage.get_user(session.user_id).await?)
}

// ============================================================================
// Extractors
// ============================================================================

/// Any logged-in user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct SessionUser(pub User);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_user(state, &parts.headers)
            .await?
            .map(SessionUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Logged-in admin. Rejects with 401 without a session and 403 for
/// non-admins.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionUser(user) = SessionUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = user.id, "non-admin user attempted an admin operation");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::config::MIN_BCRYPT_COST;
    use crate::storage::MemStorage;

    #[test]
    fn test_session_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), SESSION_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_session_token());
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let hashed = hash_token("abc");
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_token("abc"));
        assert_ne!(hashed, hash_token("abd"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 600, false);
        assert!(cookie.starts_with("storefront.sid=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=600"));
        assert!(!cookie.contains("Secure"));
        assert!(session_cookie("tok", 600, true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_session_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; storefront.sid=abc123; lang=pt"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("storefront.sid="));
        assert_eq!(session_token(&headers), None);
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let hashed = hash_password("s3cret!".to_string(), MIN_BCRYPT_COST)
            .await
            .unwrap();
        assert!(is_bcrypt_hash(&hashed));
        assert!(verify_password("s3cret!".to_string(), hashed.clone()).await);
        assert!(!verify_password("wrong".to_string(), hashed).await);
    }

    #[tokio::test]
    async fn test_plain_text_stored_password_never_verifies() {
        assert!(!verify_password("admin123".to_string(), "admin123".to_string()).await);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let storage = MemStorage::new();
        let admin = NewUser {
            username: "admin".to_string(),
            password_hash: "$2b$04$placeholder".to_string(),
            is_admin: true,
        };
        let first = ensure_admin(&storage, admin.clone()).await.unwrap();
        let second = ensure_admin(&storage, admin).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_admin);
    }

    #[tokio::test]
    async fn test_admin_account_prefers_configured_hash() {
        let config = AppConfig {
            admin_password_hash: Some("$2b$04$preset".to_string()),
            ..AppConfig::default()
        };
        let admin = admin_account(&config).await.unwrap();
        assert_eq!(admin.password_hash, "$2b$04$preset");
        assert!(admin.is_admin);
    }

    #[tokio::test]
    async fn test_admin_account_rejects_plain_password_as_hash() {
        let config = AppConfig {
            admin_password_hash: Some("hunter22".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            admin_account(&config).await,
            Err(AuthError::InvalidAdminHash)
        ));
    }
}

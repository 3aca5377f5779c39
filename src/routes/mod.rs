/**
 * Routes Module
 * API route handlers
 */

pub mod audit_logs;
pub mod auth;
pub mod brands;
pub mod cart;
pub mod categories;
pub mod health;
pub mod inventory;
pub mod products;
pub mod upload;

/// Upper bound for every `?limit=` query parameter.
pub const MAX_LIMIT: i64 = 500;

/// Requested limit, or `default`, clamped to `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, HeaderMap, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::MemorySessionStore;
    use crate::config::{AppConfig, MIN_BCRYPT_COST};
    use crate::models::NewUser;
    use crate::state::AppState;
    use crate::storage::MemStorage;

    pub const ADMIN_USERNAME: &str = "admin";
    pub const ADMIN_PASSWORD: &str = "admin123";

    pub struct TestApp {
        pub app: Router,
        pub storage: Arc<MemStorage>,
        pub state: AppState,
    }

    /// Router over a seeded in-memory store, with cheap bcrypt.
    pub fn test_app() -> TestApp {
        let password_hash = bcrypt::hash(ADMIN_PASSWORD, MIN_BCRYPT_COST).unwrap();
        let storage = Arc::new(MemStorage::seeded(NewUser {
            username: ADMIN_USERNAME.to_string(),
            password_hash,
            is_admin: true,
        }));
        let config = AppConfig {
            bcrypt_cost: MIN_BCRYPT_COST,
            upload_dir: std::env::temp_dir()
                .join(format!("storefront-uploads-{}", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        let state = AppState::new(
            storage.clone(),
            Arc::new(MemorySessionStore::new()),
            config,
        );
        TestApp {
            app: crate::create_app(state.clone()),
            storage,
            state,
        }
    }

    pub fn request(method: Method, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    /// Sends the request; a non-JSON or empty body reads as `Value::Null`.
    pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, headers, value)
    }

    /// `name=value` pair of the session cookie set by the response.
    pub fn session_cookie_pair(headers: &HeaderMap) -> String {
        headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    pub async fn login(app: &Router, username: &str, password: &str) -> String {
        let (status, headers, _) = send(
            app,
            request(
                Method::POST,
                "/api/login",
                Some(json!({"username": username, "password": password})),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login as {} failed", username);
        session_cookie_pair(&headers)
    }

    pub async fn admin_cookie(app: &Router) -> String {
        login(app, ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Registers a fresh non-admin user and returns its session cookie.
    pub async fn customer_cookie(app: &Router) -> String {
        let (status, headers, _) = send(
            app,
            request(
                Method::POST,
                "/api/register",
                Some(json!({"username": "shopper", "password": "secret1"})),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        session_cookie_pair(&headers)
    }
}

//! Storefront backend - catalog, cart, inventory and audit REST API

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::auth::{AuthError, MemorySessionStore, PgSessionStore};
use crate::config::{AppConfig, ConfigError};
use crate::state::AppState;
use crate::storage::{MemStorage, PgStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// CORS from ALLOWED_ORIGINS / FRONTEND_ORIGIN, or the local dev frontends.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        origins = vec![
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
            HeaderValue::from_static("http://localhost:3000"),
        ];
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config);
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        // Auth
        .route("/api/register", post(routes::auth::register))
        .route("/api/login", post(routes::auth::login))
        .route("/api/logout", post(routes::auth::logout))
        .route("/api/user", get(routes::auth::current_user))
        .route("/api/admin/status", get(routes::auth::admin_status))
        // Products
        .route(
            "/api/products",
            get(routes::products::list_products).post(routes::products::create_product),
        )
        .route("/api/products/featured", get(routes::products::list_featured))
        .route("/api/products/admin", get(routes::products::list_admin_products))
        .route(
            "/api/products/category/{category}",
            get(routes::products::list_by_category),
        )
        .route(
            "/api/products/{id}",
            get(routes::products::get_product)
                .put(routes::products::update_product)
                .delete(routes::products::delete_product),
        )
        // Categories & brands
        .route(
            "/api/categories",
            get(routes::categories::list_categories).post(routes::categories::create_category),
        )
        .route(
            "/api/categories/{id}",
            get(routes::categories::get_category)
                .put(routes::categories::update_category)
                .delete(routes::categories::delete_category),
        )
        .route(
            "/api/brands",
            get(routes::brands::list_brands).post(routes::brands::create_brand),
        )
        .route(
            "/api/brands/{id}",
            get(routes::brands::get_brand)
                .put(routes::brands::update_brand)
                .delete(routes::brands::delete_brand),
        )
        // Cart: GET takes a session id, PUT/DELETE a row id
        .route("/api/cart", post(routes::cart::add_to_cart))
        .route(
            "/api/cart/{id}",
            get(routes::cart::list_cart)
                .put(routes::cart::update_cart_item)
                .delete(routes::cart::remove_cart_item),
        )
        .route(
            "/api/cart/clear/{session_id}",
            axum::routing::delete(routes::cart::clear_cart),
        )
        // Inventory & audit
        .route(
            "/api/inventory/update-stock",
            post(routes::inventory::update_stock),
        )
        .route("/api/inventory/low-stock", get(routes::inventory::low_stock))
        .route(
            "/api/inventory/transactions",
            get(routes::inventory::transactions),
        )
        .route("/api/audit-logs", get(routes::audit_logs::list_audit_logs))
        // Uploads
        .route(
            "/api/upload",
            post(routes::upload::upload_image)
                .layer(DefaultBodyLimit::max(routes::upload::MAX_BODY_SIZE)),
        )
        .nest_service("/uploads", uploads)
        // Health
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Largest accepted body is an image upload
        .layer(RequestBodyLimitLayer::new(routes::upload::MAX_BODY_SIZE))
        .layer(cors)
}

/// Picks the storage backend: Postgres when DATABASE_URL is set, the seeded
/// in-memory store otherwise. A configured database that cannot be reached
/// is a startup error.
pub async fn build_state(config: AppConfig) -> Result<AppState, StartupError> {
    let admin = auth::admin_account(&config).await?;

    match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(&db::DbConfig::from_env(url.clone())).await?;
            db::run_migrations(&pool).await?;

            let storage = PgStorage::new(pool.clone());
            storage.rehash_legacy_passwords(config.bcrypt_cost).await?;
            auth::ensure_admin(&storage, admin).await?;

            tracing::info!("using postgres storage");
            Ok(AppState::new(
                Arc::new(storage),
                Arc::new(PgSessionStore::new(pool)),
                config,
            ))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory storage");
            Ok(AppState::new(
                Arc::new(MemStorage::seeded(admin)),
                Arc::new(MemorySessionStore::new()),
                config,
            ))
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    config.warn_if_insecure();
    let addr = config.socket_addr()?;

    let state = build_state(config).await?;
    let _pruner =
        auth::spawn_session_pruner(state.sessions.clone(), state.config.session_prune_interval);

    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::test_support::test_app;

    #[tokio::test]
    async fn test_build_state_without_database_uses_memory() {
        let config = AppConfig {
            bcrypt_cost: crate::config::MIN_BCRYPT_COST,
            ..AppConfig::default()
        };
        let state = build_state(config).await.unwrap();
        assert_eq!(state.storage.backend(), "memory");
        assert_eq!(state.sessions.backend(), "memory");

        let admin = state
            .storage
            .get_user_by_username("admin")
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_admin);
        assert!(auth::verify_password("admin123".to_string(), admin.password).await);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_dev_origin() {
        let t = test_app();
        let res = t
            .app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/products")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let t = test_app();
        let res = t
            .app
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

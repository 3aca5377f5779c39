/**
 * Health Routes
 * Liveness ping and storage readiness check
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Initialize the server start time
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// Ready check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    /// Active storage backend.
    pub storage: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health - Simple health ping
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/ready - 503 while the storage backend does not answer
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();
    let storage = state.storage.backend().to_string();

    let (status, response) = match state.storage.ping().await {
        Ok(duration) => (
            StatusCode::OK,
            ReadyResponse {
                status: "ready".to_string(),
                storage,
                timestamp: Utc::now(),
                uptime,
                response_time_ms: Some(duration.as_millis() as u64),
                error: None,
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ReadyResponse {
                    status: "not ready".to_string(),
                    storage,
                    timestamp: Utc::now(),
                    uptime,
                    response_time_ms: None,
                    error: Some("Storage backend unavailable".to_string()),
                },
            )
        }
    };

    (status, Json(response))
}

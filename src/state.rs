use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::auth::SessionStore;
use crate::config::AppConfig;
use crate::storage::Storage;

/// Shared context handed to every handler through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: AuditLogger,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        sessions: Arc<dyn SessionStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            audit: AuditLogger::new(storage.clone()),
            storage,
            sessions,
            config: Arc::new(config),
        }
    }
}

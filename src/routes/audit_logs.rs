use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::models::{AuditLog, AuditLogFilter};
use crate::routes::clamp_limit;
use crate::state::AppState;

const DEFAULT_AUDIT_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub table_name: Option<String>,
    pub record_id: Option<i32>,
    pub limit: Option<i64>,
}

/// GET /api/audit-logs
pub async fn list_audit_logs(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Vec<AuditLog>>, ApiError> {
    let filter = AuditLogFilter {
        table_name: query.table_name.filter(|t| !t.is_empty()),
        record_id: query.record_id,
        limit: clamp_limit(query.limit, DEFAULT_AUDIT_LIMIT),
    };
    Ok(Json(state.storage.list_audit_logs(filter).await?))
}

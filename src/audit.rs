//! Before/after trail for admin mutations on products, categories and brands.

use std::sync::Arc;

use serde::Serialize;

use crate::models::{AuditAction, AuditLog, AuditTable, NewAuditLog};
use crate::storage::{Storage, StorageError, StorageResult};

#[derive(Clone)]
pub struct AuditLogger {
    storage: Arc<dyn Storage>,
}

fn snapshot<T: Serialize>(value: &T) -> StorageResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| StorageError::Backend(format!("audit snapshot failed: {}", e)))
}

impl AuditLogger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn log_create<T: Serialize>(
        &self,
        table: AuditTable,
        record_id: i32,
        created: &T,
        user_id: i32,
        description: impl Into<String>,
    ) -> StorageResult<AuditLog> {
        self.write(
            table,
            record_id,
            AuditAction::Created,
            None,
            Some(snapshot(created)?),
            user_id,
            description.into(),
        )
        .await
    }

    pub async fn log_update<T: Serialize>(
        &self,
        table: AuditTable,
        record_id: i32,
        before: &T,
        after: &T,
        user_id: i32,
        description: impl Into<String>,
    ) -> StorageResult<AuditLog> {
        self.write(
            table,
            record_id,
            AuditAction::Updated,
            Some(snapshot(before)?),
            Some(snapshot(after)?),
            user_id,
            description.into(),
        )
        .await
    }

    pub async fn log_delete<T: Serialize>(
        &self,
        table: AuditTable,
        record_id: i32,
        deleted: &T,
        user_id: i32,
        description: impl Into<String>,
    ) -> StorageResult<AuditLog> {
        self.write(
            table,
            record_id,
            AuditAction::Deleted,
            Some(snapshot(deleted)?),
            None,
            user_id,
            description.into(),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn write(
        &self,
        table: AuditTable,
        record_id: i32,
        action: AuditAction,
        old_data: Option<serde_json::Value>,
        new_data: Option<serde_json::Value>,
        user_id: i32,
        description: String,
    ) -> StorageResult<AuditLog> {
        self.storage
            .create_audit_log(NewAuditLog {
                table_name: table.as_str().to_string(),
                record_id,
                action,
                old_data,
                new_data,
                user_id: Some(user_id),
                description: Some(description),
            })
            .await
    }
}

/// Logs a failed audit write. The mutation it describes has already
/// succeeded and is not rolled back.
pub fn report_failure(result: StorageResult<AuditLog>, table: AuditTable, record_id: i32) {
    if let Err(e) = result {
        tracing::error!(
            table = table.as_str(),
            record_id,
            error = %e,
            "failed to write audit log"
        );
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AuditAction::Created),
            "updated" => Ok(AuditAction::Updated),
            "deleted" => Ok(AuditAction::Deleted),
            other => Err(UnknownVariant {
                kind: "audit action",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for AuditAction {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Tables whose admin mutations are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTable {
    Products,
    Categories,
    Brands,
}

impl AuditTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditTable::Products => "products",
            AuditTable::Categories => "categories",
            AuditTable::Brands => "brands",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: i32,
    pub table_name: String,
    pub record_id: i32,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub user_id: Option<i32>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub table_name: String,
    pub record_id: i32,
    pub action: AuditAction,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub user_id: Option<i32>,
    pub description: Option<String>,
}

/// Filter for `Storage::list_audit_logs`.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub table_name: Option<String>,
    pub record_id: Option<i32>,
    pub limit: i64,
}

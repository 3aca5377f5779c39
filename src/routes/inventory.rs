/**
 * Inventory Routes
 * Admin stock adjustments and the transaction ledger
 */
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{ApiError, ValidJson};
use crate::inventory::StockOperation;
use crate::models::{InventoryTransaction, ProductView, StockAdjustment, TransactionType};
use crate::routes::clamp_limit;
use crate::state::AppState;

const DEFAULT_LOW_STOCK_LIMIT: i64 = 10;
const DEFAULT_TRANSACTIONS_LIMIT: i64 = 50;

fn default_transaction_type() -> TransactionType {
    TransactionType::Adjustment
}

/// Body of POST /api/inventory/update-stock
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
    pub operation: StockOperation,
    #[serde(rename = "type", default = "default_transaction_type")]
    pub transaction_type: TransactionType,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub product_id: Option<i32>,
    pub limit: Option<i64>,
}

/// POST /api/inventory/update-stock
/// Removals larger than the current stock floor at zero. The ledger keeps
/// the requested signed quantity.
pub async fn update_stock(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateStockRequest>,
) -> Result<Json<ProductView>, ApiError> {
    let delta = payload.operation.delta(payload.quantity);
    let updated = state
        .storage
        .adjust_stock(StockAdjustment {
            product_id: payload.product_id,
            delta,
            user_id: admin.id,
            transaction_type: payload.transaction_type,
            notes: payload.notes,
        })
        .await?
        .ok_or(ApiError::NotFound("Product"))?;

    tracing::info!(
        product_id = payload.product_id,
        delta,
        stock = updated.product.stock,
        transaction_type = %payload.transaction_type,
        "stock adjusted"
    );

    Ok(Json(updated))
}

/// GET /api/inventory/low-stock
pub async fn low_stock(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_LOW_STOCK_LIMIT);
    Ok(Json(state.storage.list_low_stock(limit).await?))
}

/// GET /api/inventory/transactions
pub async fn transactions(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<InventoryTransaction>>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_TRANSACTIONS_LIMIT);
    Ok(Json(
        state
            .storage
            .list_transactions(query.product_id, limit)
            .await?,
    ))
}

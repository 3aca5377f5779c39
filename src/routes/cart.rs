/**
 * Cart Routes
 * Anonymous carts keyed by a client-supplied session id
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ValidJson};
use crate::models::{CartItem, CartItemWithProduct, InsertCartItem, UpdateCartQuantity};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearCartResponse {
    pub success: bool,
    pub removed: u64,
}

/// GET /api/cart/{sessionId}
pub async fn list_cart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<CartItemWithProduct>>, ApiError> {
    Ok(Json(state.storage.list_cart_items(&session_id).await?))
}

/// POST /api/cart
/// Adding a product already in the cart increases its quantity.
pub async fn add_to_cart(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<InsertCartItem>,
) -> Result<impl IntoResponse, ApiError> {
    if state.storage.get_product(payload.product_id).await?.is_none() {
        return Err(ApiError::NotFound("Product"));
    }
    let item = state.storage.add_to_cart(payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/cart/{id}
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<UpdateCartQuantity>,
) -> Result<Json<CartItem>, ApiError> {
    state
        .storage
        .update_cart_item(id, payload.quantity)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Cart item"))
}

/// DELETE /api/cart/{id}
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    if state.storage.remove_cart_item(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Cart item"))
    }
}

/// DELETE /api/cart/clear/{sessionId}
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let removed = state.storage.clear_cart(&session_id).await?;
    tracing::debug!(removed, "cart cleared");
    Ok(Json(ClearCartResponse {
        success: true,
        removed,
    }))
}

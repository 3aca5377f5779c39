/**
 * Product Routes
 * Public catalog reads and audited admin CRUD
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::audit;
use crate::auth::AdminUser;
use crate::error::{ApiError, ValidJson};
use crate::models::{AuditTable, InsertProduct, NewProduct, ProductView, UpdateProduct};
use crate::state::AppState;

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    Ok(Json(state.storage.list_products().await?))
}

/// GET /api/products/featured
pub async fn list_featured(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    Ok(Json(state.storage.list_featured_products().await?))
}

/// GET /api/products/admin
/// Whole catalog, newest first.
pub async fn list_admin_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let mut products = state.storage.list_products().await?;
    products.sort_by(|a, b| {
        b.product
            .created_at
            .cmp(&a.product.created_at)
            .then(b.product.id.cmp(&a.product.id))
    });
    Ok(Json(products))
}

/// GET /api/products/category/{category}
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    Ok(Json(
        state.storage.list_products_by_category(&category).await?,
    ))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductView>, ApiError> {
    state
        .storage
        .get_product(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Product"))
}

/// POST /api/products
pub async fn create_product(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<InsertProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .storage
        .create_product(NewProduct::from(payload))
        .await?;
    let id = created.product.id;
    tracing::info!(product_id = id, sku = %created.product.sku, "product created");

    audit::report_failure(
        state
            .audit
            .log_create(
                AuditTable::Products,
                id,
                &created,
                admin.id,
                format!("Created product \"{}\"", created.product.name),
            )
            .await,
        AuditTable::Products,
        id,
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/products/{id}
/// Partial update. Stock only moves through inventory adjustments.
pub async fn update_product(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<UpdateProduct>,
) -> Result<Json<ProductView>, ApiError> {
    let before = state
        .storage
        .get_product(id)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    let after = state
        .storage
        .update_product(id, payload)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    tracing::info!(product_id = id, "product updated");

    audit::report_failure(
        state
            .audit
            .log_update(
                AuditTable::Products,
                id,
                &before,
                &after,
                admin.id,
                format!("Updated product \"{}\"", after.product.name),
            )
            .await,
        AuditTable::Products,
        id,
    );

    Ok(Json(after))
}

/// DELETE /api/products/{id}
pub async fn delete_product(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let before = state
        .storage
        .get_product(id)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    if !state.storage.delete_product(id).await? {
        return Err(ApiError::NotFound("Product"));
    }
    tracing::info!(product_id = id, "product deleted");

    audit::report_failure(
        state
            .audit
            .log_delete(
                AuditTable::Products,
                id,
                &before,
                admin.id,
                format!("Deleted product \"{}\"", before.product.name),
            )
            .await,
        AuditTable::Products,
        id,
    );

    Ok(StatusCode::NO_CONTENT)
}

/**
 * Category Routes
 * Public listing and audited admin CRUD
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::audit;
use crate::auth::AdminUser;
use crate::error::{ApiError, ValidJson};
use crate::models::{AuditTable, Category, InsertCategory, UpdateCategory};
use crate::state::AppState;

/// Query parameters shared by the category and brand listings.
#[derive(Debug, Default, Deserialize)]
pub struct ActiveFilter {
    pub active: Option<bool>,
}

impl ActiveFilter {
    pub fn keeps(&self, is_active: bool) -> bool {
        !self.active.unwrap_or(false) || is_active
    }
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    Query(filter): Query<ActiveFilter>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.storage.list_categories().await?;
    Ok(Json(
        categories
            .into_iter()
            .filter(|c| filter.keeps(c.is_active))
            .collect(),
    ))
}

/// GET /api/categories/{id}
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Category>, ApiError> {
    state
        .storage
        .get_category(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Category"))
}

/// POST /api/categories
pub async fn create_category(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<InsertCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.storage.create_category(payload).await?;
    tracing::info!(category_id = created.id, slug = %created.slug, "category created");

    audit::report_failure(
        state
            .audit
            .log_create(
                AuditTable::Categories,
                created.id,
                &created,
                admin.id,
                format!("Created category \"{}\"", created.name),
            )
            .await,
        AuditTable::Categories,
        created.id,
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<UpdateCategory>,
) -> Result<Json<Category>, ApiError> {
    let before = state
        .storage
        .get_category(id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    let after = state
        .storage
        .update_category(id, payload)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;

    audit::report_failure(
        state
            .audit
            .log_update(
                AuditTable::Categories,
                id,
                &before,
                &after,
                admin.id,
                format!("Updated category \"{}\"", after.name),
            )
            .await,
        AuditTable::Categories,
        id,
    );

    Ok(Json(after))
}

/// DELETE /api/categories/{id}
/// Products keep their category text.
pub async fn delete_category(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let before = state
        .storage
        .get_category(id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    if !state.storage.delete_category(id).await? {
        return Err(ApiError::NotFound("Category"));
    }
    tracing::info!(category_id = id, "category deleted");

    audit::report_failure(
        state
            .audit
            .log_delete(
                AuditTable::Categories,
                id,
                &before,
                admin.id,
                format!("Deleted category \"{}\"", before.name),
            )
            .await,
        AuditTable::Categories,
        id,
    );

    Ok(StatusCode::NO_CONTENT)
}

/**
 * Brand Routes
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::audit;
use crate::auth::AdminUser;
use crate::error::{ApiError, ValidJson};
use crate::models::{AuditTable, Brand, InsertBrand, UpdateBrand};
use crate::routes::categories::ActiveFilter;
use crate::state::AppState;

/// GET /api/brands
pub async fn list_brands(
    State(state): State<AppState>,
    Query(filter): Query<ActiveFilter>,
) -> Result<Json<Vec<Brand>>, ApiError> {
    let brands = state.storage.list_brands().await?;
    Ok(Json(
        brands
            .into_iter()
            .filter(|b| filter.keeps(b.is_active))
            .collect(),
    ))
}

/// GET /api/brands/{id}
pub async fn get_brand(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Brand>, ApiError> {
    state
        .storage
        .get_brand(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Brand"))
}

/// POST /api/brands
pub async fn create_brand(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<InsertBrand>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.storage.create_brand(payload).await?;
    tracing::info!(brand_id = created.id, name = %created.name, "brand created");

    audit::report_failure(
        state
            .audit
            .log_create(
                AuditTable::Brands,
                created.id,
                &created,
                admin.id,
                format!("Created brand \"{}\"", created.name),
            )
            .await,
        AuditTable::Brands,
        created.id,
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/brands/{id}
pub async fn update_brand(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<UpdateBrand>,
) -> Result<Json<Brand>, ApiError> {
    let before = state
        .storage
        .get_brand(id)
        .await?
        .ok_or(ApiError::NotFound("Brand"))?;
    let after = state
        .storage
        .update_brand(id, payload)
        .await?
        .ok_or(ApiError::NotFound("Brand"))?;

    audit::report_failure(
        state
            .audit
            .log_update(
                AuditTable::Brands,
                id,
                &before,
                &after,
                admin.id,
                format!("Updated brand \"{}\"", after.name),
            )
            .await,
        AuditTable::Brands,
        id,
    );

    Ok(Json(after))
}

/// DELETE /api/brands/{id}
pub async fn delete_brand(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let before = state
        .storage
        .get_brand(id)
        .await?
        .ok_or(ApiError::NotFound("Brand"))?;
    if !state.storage.delete_brand(id).await? {
        return Err(ApiError::NotFound("Brand"));
    }

    audit::report_failure(
        state
            .audit
            .log_delete(
                AuditTable::Brands,
                id,
                &before,
                admin.id,
                format!("Deleted brand \"{}\"", before.name),
            )
            .await,
        AuditTable::Brands,
        id,
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    use crate::models::{AuditAction, AuditLogFilter};
    use crate::routes::test_support::{admin_cookie, request, send, test_app};
    use crate::storage::Storage;

    #[tokio::test]
    async fn test_brand_crud_is_audited() {
        let t = test_app();
        let admin = admin_cookie(&t.app).await;

        let (status, _, created) = send(
            &t.app,
            request(Method::POST, "/api/brands", Some(json!({"name": "Puma"})), Some(&admin)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap() as i32;
        let uri = format!("/api/brands/{}", id);

        let (status, _, updated) = send(
            &t.app,
            request(
                Method::PUT,
                &uri,
                Some(json!({"description": "Sportswear"})),
                Some(&admin),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Puma");
        assert_eq!(updated["description"], "Sportswear");

        let (status, _, _) = send(&t.app, request(Method::DELETE, &uri, None, Some(&admin))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let logs = t
            .storage
            .list_audit_logs(AuditLogFilter {
                table_name: Some("brands".to_string()),
                record_id: Some(id),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].action, AuditAction::Deleted);
        assert!(logs[0].new_data.is_none());
        assert!(logs[2].old_data.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_brand_name_conflicts() {
        let t = test_app();
        let admin = admin_cookie(&t.app).await;
        let (status, _, body) = send(
            &t.app,
            request(Method::POST, "/api/brands", Some(json!({"name": "Nike"})), Some(&admin)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
    }

    #[tokio::test]
    async fn test_brand_reads_are_public() {
        let t = test_app();
        let (status, _, body) = send(&t.app, request(Method::GET, "/api/brands", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _, _) = send(&t.app, request(Method::GET, "/api/brands/77", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

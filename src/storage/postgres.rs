//! Postgres storage backend.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Storage, StorageResult, FEATURED_LIMIT};
use crate::inventory::next_stock;
use crate::models::{
    AuditLog, AuditLogFilter, Brand, CartItem, CartItemWithProduct, Category, InsertBrand,
    InsertCartItem, InsertCategory, InventoryTransaction, NewAuditLog, NewProduct, NewUser,
    Product, ProductView, StockAdjustment, UpdateBrand, UpdateCategory, UpdateProduct, User,
};

const USER_COLUMNS: &str = "id, username, password, is_admin";
const CATEGORY_COLUMNS: &str =
    "id, name, description, image_url, slug, is_active, created_at, updated_at";
const BRAND_COLUMNS: &str = "id, name, description, image_url, is_active, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, category, brand, image_url, \
     video_url, is_new, is_featured, stock, low_stock_threshold, sku, created_at";
const CART_COLUMNS: &str = "id, product_id, quantity, session_id, created_at";
const TRANSACTION_COLUMNS: &str =
    "id, product_id, quantity, transaction_type, notes, created_by, created_at";
const AUDIT_COLUMNS: &str =
    "id, table_name, record_id, action, old_data, new_data, user_id, description, created_at";

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Rehashes every stored password that is not already a bcrypt hash.
    /// Runs once at startup; login only ever verifies bcrypt hashes.
    pub async fn rehash_legacy_passwords(&self, cost: u32) -> Result<usize, crate::auth::AuthError> {
        let legacy: Vec<(i32, String)> =
            sqlx::query_as("SELECT id, password FROM users WHERE password NOT LIKE '$2%'")
                .fetch_all(&self.pool)
                .await
                .map_err(super::StorageError::from)?;

        for (id, plain) in &legacy {
            let hashed = crate::auth::hash_password(plain.clone(), cost).await?;
            sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
                .bind(&hashed)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(super::StorageError::from)?;
        }

        if !legacy.is_empty() {
            tracing::warn!(count = legacy.len(), "rehashed legacy plain-text passwords");
        }
        Ok(legacy.len())
    }
}

/// Cart upsert. Merged quantities saturate at `i32::MAX` like the in-memory
/// store instead of overflowing the INTEGER column.
fn add_to_cart_sql() -> String {
    format!(
        r#"
        INSERT INTO cart_items (product_id, quantity, session_id, created_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (product_id, session_id)
        DO UPDATE SET quantity =
            LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, {})::INTEGER
        RETURNING {CART_COLUMNS}
        "#,
        i32::MAX
    )
}

#[async_trait]
impl Storage for PgStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StorageResult<Duration> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let sql = format!(
            "INSERT INTO users (username, password, is_admin) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.is_admin)
            .fetch_one(&self.pool)
            .await?)
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: i32) -> StorageResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, category: InsertCategory) -> StorageResult<Category> {
        let sql = format!(
            r#"
            INSERT INTO categories (name, description, image_url, slug, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING {CATEGORY_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(&category.name)
            .bind(&category.description)
            .bind(&category.image_url)
            .bind(&category.slug)
            .bind(category.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_category(
        &self,
        id: i32,
        update: UpdateCategory,
    ) -> StorageResult<Option<Category>> {
        let sql = format!(
            r#"
            UPDATE categories
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                image_url = COALESCE($3, image_url),
                slug = COALESCE($4, slug),
                is_active = COALESCE($5, is_active),
                updated_at = now()
            WHERE id = $6
            RETURNING {CATEGORY_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.image_url)
            .bind(&update.slug)
            .bind(update.is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: i32) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Brands
    // ------------------------------------------------------------------

    async fn list_brands(&self) -> StorageResult<Vec<Brand>> {
        let sql = format!("SELECT {BRAND_COLUMNS} FROM brands ORDER BY id");
        Ok(sqlx::query_as::<_, Brand>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_brand(&self, id: i32) -> StorageResult<Option<Brand>> {
        let sql = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = $1");
        Ok(sqlx::query_as::<_, Brand>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_brand(&self, brand: InsertBrand) -> StorageResult<Brand> {
        let sql = format!(
            r#"
            INSERT INTO brands (name, description, image_url, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING {BRAND_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Brand>(&sql)
            .bind(&brand.name)
            .bind(&brand.description)
            .bind(&brand.image_url)
            .bind(brand.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_brand(&self, id: i32, update: UpdateBrand) -> StorageResult<Option<Brand>> {
        let sql = format!(
            r#"
            UPDATE brands
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                image_url = COALESCE($3, image_url),
                is_active = COALESCE($4, is_active),
                updated_at = now()
            WHERE id = $5
            RETURNING {BRAND_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Brand>(&sql)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.image_url)
            .bind(update.is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_brand(&self, id: i32) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM brands WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    async fn list_products(&self) -> StorageResult<Vec<ProductView>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let rows = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    async fn get_product(&self, id: i32) -> StorageResult<Option<ProductView>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ProductView::from))
    }

    async fn list_products_by_category(&self, category: &str) -> StorageResult<Vec<ProductView>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE category = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    async fn list_featured_products(&self) -> StorageResult<Vec<ProductView>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_featured = true ORDER BY id LIMIT $1"
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(FEATURED_LIMIT as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    async fn create_product(&self, product: NewProduct) -> StorageResult<ProductView> {
        let sql = format!(
            r#"
            INSERT INTO products (
                name, description, price, category, brand, image_url, video_url,
                is_new, is_featured, stock, low_stock_threshold, sku, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(&product.category)
            .bind(&product.brand)
            .bind(&product.image_url)
            .bind(&product.video_url)
            .bind(product.is_new)
            .bind(product.is_featured)
            .bind(product.stock)
            .bind(product.low_stock_threshold)
            .bind(&product.sku)
            .fetch_one(&self.pool)
            .await?;
        Ok(ProductView::from(row))
    }

    async fn update_product(
        &self,
        id: i32,
        update: UpdateProduct,
    ) -> StorageResult<Option<ProductView>> {
        let sql = format!(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                category = COALESCE($4, category),
                brand = COALESCE($5, brand),
                image_url = COALESCE($6, image_url),
                video_url = COALESCE($7, video_url),
                is_new = COALESCE($8, is_new),
                is_featured = COALESCE($9, is_featured),
                low_stock_threshold = COALESCE($10, low_stock_threshold),
                sku = COALESCE($11, sku)
            WHERE id = $12
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(&update.name)
            .bind(&update.description)
            .bind(update.price)
            .bind(&update.category)
            .bind(&update.brand)
            .bind(&update.image_url)
            .bind(&update.video_url)
            .bind(update.is_new)
            .bind(update.is_featured)
            .bind(update.low_stock_threshold)
            .bind(&update.sku)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ProductView::from))
    }

    async fn delete_product(&self, id: i32) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------

    async fn list_cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItemWithProduct>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE session_id = $1 ORDER BY id");
        let items = sqlx::query_as::<_, CartItem>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&product_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .map(|product| CartItemWithProduct {
                        item,
                        product: ProductView::from(product.clone()),
                    })
            })
            .collect())
    }

    async fn add_to_cart(&self, item: InsertCartItem) -> StorageResult<CartItem> {
        let sql = add_to_cart_sql();
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(&item.session_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_cart_item(&self, id: i32, quantity: i32) -> StorageResult<Option<CartItem>> {
        let sql = format!("UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING {CART_COLUMNS}");
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(quantity)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn remove_cart_item(&self, id: i32) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, session_id: &str) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    async fn adjust_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> StorageResult<Option<ProductView>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent adjustments of the same product.
        let current: Option<(i32,)> =
            sqlx::query_as("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(adjustment.product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((current,)) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let sql = format!("UPDATE products SET stock = $1 WHERE id = $2 RETURNING {PRODUCT_COLUMNS}");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(next_stock(current, adjustment.delta))
            .bind(adjustment.product_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_transactions
                (product_id, quantity, transaction_type, notes, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(adjustment.product_id)
        .bind(adjustment.delta)
        .bind(adjustment.transaction_type.as_str())
        .bind(&adjustment.notes)
        .bind(adjustment.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(ProductView::from(product)))
    }

    async fn list_low_stock(&self, limit: i64) -> StorageResult<Vec<ProductView>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE stock <= low_stock_threshold \
             ORDER BY stock ASC, id ASC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    async fn list_transactions(
        &self,
        product_id: Option<i32>,
        limit: i64,
    ) -> StorageResult<Vec<InventoryTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions \
             WHERE ($1::INTEGER IS NULL OR product_id = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        Ok(sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    async fn list_audit_logs(&self, filter: AuditLogFilter) -> StorageResult<Vec<AuditLog>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             WHERE ($1::TEXT IS NULL OR table_name = $1) \
               AND ($2::INTEGER IS NULL OR record_id = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        );
        Ok(sqlx::query_as::<_, AuditLog>(&sql)
            .bind(&filter.table_name)
            .bind(filter.record_id)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_audit_log(&self, entry: NewAuditLog) -> StorageResult<AuditLog> {
        let sql = format!(
            r#"
            INSERT INTO audit_logs
                (table_name, record_id, action, old_data, new_data, user_id, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            RETURNING {AUDIT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, AuditLog>(&sql)
            .bind(&entry.table_name)
            .bind(entry.record_id)
            .bind(entry.action.as_str())
            .bind(&entry.old_data)
            .bind(&entry.new_data)
            .bind(entry.user_id)
            .bind(&entry.description)
            .fetch_one(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_upsert_saturates_quantity() {
        let sql = add_to_cart_sql();
        assert!(sql.contains("ON CONFLICT (product_id, session_id)"));
        assert!(sql.contains("LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, 2147483647)"));
    }
}

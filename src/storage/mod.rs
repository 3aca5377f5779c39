//! Storage interface shared by the in-memory and Postgres backends.
//!
//! "By id" lookups return `Ok(None)` (or `Ok(false)` for deletes) when the
//! row does not exist; turning that into a 404 is the caller's job.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{
    AuditLog, AuditLogFilter, Brand, CartItem, CartItemWithProduct, Category, InsertBrand,
    InsertCartItem, InsertCategory, InventoryTransaction, NewAuditLog, NewProduct, NewUser,
    ProductView, StockAdjustment, UpdateBrand, UpdateCategory, UpdateProduct, User,
};

pub use memory::MemStorage;
pub use postgres::PgStorage;

/// Number of products returned by `list_featured_products`.
pub const FEATURED_LIMIT: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(sqlx::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if unique_violation {
            let constraint = err
                .as_database_error()
                .and_then(|db| db.constraint())
                .unwrap_or("unique constraint")
                .to_string();
            StorageError::Conflict(format!("Duplicate value violates {}", constraint))
        } else {
            StorageError::Database(err)
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name used in logs and health output.
    fn backend(&self) -> &'static str;

    /// Round-trip check against the backend.
    async fn ping(&self) -> StorageResult<Duration>;

    // Users
    async fn get_user(&self, id: i32) -> StorageResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;

    // Categories
    async fn list_categories(&self) -> StorageResult<Vec<Category>>;
    async fn get_category(&self, id: i32) -> StorageResult<Option<Category>>;
    async fn create_category(&self, category: InsertCategory) -> StorageResult<Category>;
    async fn update_category(
        &self,
        id: i32,
        update: UpdateCategory,
    ) -> StorageResult<Option<Category>>;
    async fn delete_category(&self, id: i32) -> StorageResult<bool>;

    // Brands
    async fn list_brands(&self) -> StorageResult<Vec<Brand>>;
    async fn get_brand(&self, id: i32) -> StorageResult<Option<Brand>>;
    async fn create_brand(&self, brand: InsertBrand) -> StorageResult<Brand>;
    async fn update_brand(&self, id: i32, update: UpdateBrand) -> StorageResult<Option<Brand>>;
    async fn delete_brand(&self, id: i32) -> StorageResult<bool>;

    // Products
    async fn list_products(&self) -> StorageResult<Vec<ProductView>>;
    async fn get_product(&self, id: i32) -> StorageResult<Option<ProductView>>;
    async fn list_products_by_category(&self, category: &str) -> StorageResult<Vec<ProductView>>;
    /// At most [`FEATURED_LIMIT`] featured products.
    async fn list_featured_products(&self) -> StorageResult<Vec<ProductView>>;
    async fn create_product(&self, product: NewProduct) -> StorageResult<ProductView>;
    async fn update_product(
        &self,
        id: i32,
        update: UpdateProduct,
    ) -> StorageResult<Option<ProductView>>;
    async fn delete_product(&self, id: i32) -> StorageResult<bool>;

    // Cart
    async fn list_cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItemWithProduct>>;
    /// Increments the quantity of an existing (product, session) row, or
    /// inserts a new one.
    async fn add_to_cart(&self, item: InsertCartItem) -> StorageResult<CartItem>;
    async fn update_cart_item(&self, id: i32, quantity: i32) -> StorageResult<Option<CartItem>>;
    async fn remove_cart_item(&self, id: i32) -> StorageResult<bool>;
    /// Returns the number of rows removed.
    async fn clear_cart(&self, session_id: &str) -> StorageResult<u64>;

    // Inventory
    /// Applies `max(0, stock + delta)` and records exactly one transaction,
    /// atomically. `Ok(None)` when the product does not exist.
    async fn adjust_stock(&self, adjustment: StockAdjustment)
        -> StorageResult<Option<ProductView>>;
    async fn list_low_stock(&self, limit: i64) -> StorageResult<Vec<ProductView>>;
    /// Most recent first.
    async fn list_transactions(
        &self,
        product_id: Option<i32>,
        limit: i64,
    ) -> StorageResult<Vec<InventoryTransaction>>;

    // Audit
    /// Most recent first.
    async fn list_audit_logs(&self, filter: AuditLogFilter) -> StorageResult<Vec<AuditLog>>;
    async fn create_audit_log(&self, entry: NewAuditLog) -> StorageResult<AuditLog>;
}

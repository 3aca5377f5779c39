//! In-process storage backend.
//!
//! Every table is a `BTreeMap` keyed by id with its own counter starting at 1.
//! All state sits behind one `RwLock`, so each operation (including the
//! read-modify-write of a stock adjustment) is atomic with respect to other
//! requests. Data is lost on restart.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Storage, StorageError, StorageResult, FEATURED_LIMIT};
use crate::inventory::next_stock;
use crate::models::{
    AuditLog, AuditLogFilter, Brand, CartItem, CartItemWithProduct, Category, InsertBrand,
    InsertCartItem, InsertCategory, InventoryTransaction, NewAuditLog, NewProduct, NewUser,
    Product, ProductView, StockAdjustment, UpdateBrand, UpdateCategory, UpdateProduct, User,
};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i32, T>,
    next_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i32) -> T) -> &T {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.entry(id).or_insert_with(|| build(id))
    }
}

#[derive(Debug, Default)]
struct MemState {
    users: Table<User>,
    categories: Table<Category>,
    brands: Table<Brand>,
    products: Table<Product>,
    cart_items: Table<CartItem>,
    transactions: Table<InventoryTransaction>,
    audit_logs: Table<AuditLog>,
}

#[derive(Debug, Default)]
pub struct MemStorage {
    state: RwLock<MemState>,
    #[cfg(test)]
    fail_audit_writes: std::sync::atomic::AtomicBool,
}

impl MemStorage {
    /// Empty store with no seed data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given admin account plus the demo catalog used
    /// for zero-config local runs.
    pub fn seeded(admin: NewUser) -> Self {
        let mut state = MemState::default();
        let now = Utc::now();

        state.users.insert_with(|id| User {
            id,
            username: admin.username,
            password: admin.password_hash,
            is_admin: admin.is_admin,
        });

        let categories = [
            ("Tênis", "Tênis para corrida, treino e dia a dia", "tenis"),
            ("Roupas", "Camisetas, bermudas e agasalhos", "roupas"),
            ("Acessórios", "Bonés, meias e mochilas", "acessorios"),
            ("Promoções", "Ofertas por tempo limitado", "promocoes"),
        ];
        for (name, description, slug) in categories {
            state.categories.insert_with(|id| Category {
                id,
                name: name.to_string(),
                description: Some(description.to_string()),
                image_url: None,
                slug: slug.to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
            });
        }

        for name in ["Nike", "Adidas"] {
            state.brands.insert_with(|id| Brand {
                id,
                name: name.to_string(),
                description: None,
                image_url: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            });
        }

        state.products.insert_with(|id| Product {
            id,
            name: "Tênis Air Runner".to_string(),
            description: "Tênis de corrida com amortecimento leve".to_string(),
            price: 29990,
            category: "tenis".to_string(),
            brand: Some("Nike".to_string()),
            image_url: None,
            video_url: None,
            is_new: true,
            is_featured: true,
            stock: 12,
            low_stock_threshold: 5,
            sku: "SKU-TENIS-001".to_string(),
            created_at: now,
        });
        state.products.insert_with(|id| Product {
            id,
            name: "Camiseta Dry Fit".to_string(),
            description: "Camiseta esportiva de secagem rápida".to_string(),
            price: 8990,
            category: "roupas".to_string(),
            brand: Some("Adidas".to_string()),
            image_url: None,
            video_url: None,
            is_new: false,
            is_featured: true,
            stock: 3,
            low_stock_threshold: 5,
            sku: "SKU-ROUPA-001".to_string(),
            created_at: now,
        });

        tracing::info!(
            categories = state.categories.rows.len(),
            brands = state.brands.rows.len(),
            products = state.products.rows.len(),
            "in-memory storage seeded"
        );

        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

fn clamp_limit(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

#[async_trait]
impl Storage for MemStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StorageResult<Duration> {
        let start = std::time::Instant::now();
        let _state = self.state.read().await;
        Ok(start.elapsed())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        Ok(self.state.read().await.users.rows.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let mut state = self.state.write().await;
        if state.users.rows.values().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict("Username already exists".to_string()));
        }
        Ok(state
            .users
            .insert_with(|id| User {
                id,
                username: user.username,
                password: user.password_hash,
                is_admin: user.is_admin,
            })
            .clone())
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        Ok(self.state.read().await.categories.rows.values().cloned().collect())
    }

    async fn get_category(&self, id: i32) -> StorageResult<Option<Category>> {
        Ok(self.state.read().await.categories.rows.get(&id).cloned())
    }

    async fn create_category(&self, category: InsertCategory) -> StorageResult<Category> {
        let mut state = self.state.write().await;
        if state.categories.rows.values().any(|c| c.slug == category.slug) {
            return Err(StorageError::Conflict("Slug already exists".to_string()));
        }
        let now = Utc::now();
        Ok(state
            .categories
            .insert_with(|id| Category {
                id,
                name: category.name,
                description: category.description,
                image_url: category.image_url,
                slug: category.slug,
                is_active: category.is_active.unwrap_or(true),
                created_at: now,
                updated_at: now,
            })
            .clone())
    }

    async fn update_category(
        &self,
        id: i32,
        update: UpdateCategory,
    ) -> StorageResult<Option<Category>> {
        let mut state = self.state.write().await;
        if let Some(slug) = &update.slug {
            if state
                .categories
                .rows
                .values()
                .any(|c| c.id != id && &c.slug == slug)
            {
                return Err(StorageError::Conflict("Slug already exists".to_string()));
            }
        }
        Ok(state.categories.rows.get_mut(&id).map(|category| {
            category.apply(update, Utc::now());
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i32) -> StorageResult<bool> {
        Ok(self.state.write().await.categories.rows.remove(&id).is_some())
    }

    // ------------------------------------------------------------------
    // Brands
    // ------------------------------------------------------------------

    async fn list_brands(&self) -> StorageResult<Vec<Brand>> {
        Ok(self.state.read().await.brands.rows.values().cloned().collect())
    }

    async fn get_brand(&self, id: i32) -> StorageResult<Option<Brand>> {
        Ok(self.state.read().await.brands.rows.get(&id).cloned())
    }

    async fn create_brand(&self, brand: InsertBrand) -> StorageResult<Brand> {
        let mut state = self.state.write().await;
        if state.brands.rows.values().any(|b| b.name == brand.name) {
            return Err(StorageError::Conflict("Brand name already exists".to_string()));
        }
        let now = Utc::now();
        Ok(state
            .brands
            .insert_with(|id| Brand {
                id,
                name: brand.name,
                description: brand.description,
                image_url: brand.image_url,
                is_active: brand.is_active.unwrap_or(true),
                created_at: now,
                updated_at: now,
            })
            .clone())
    }

    async fn update_brand(&self, id: i32, update: UpdateBrand) -> StorageResult<Option<Brand>> {
        let mut state = self.state.write().await;
        if let Some(name) = &update.name {
            if state
                .brands
                .rows
                .values()
                .any(|b| b.id != id && &b.name == name)
            {
                return Err(StorageError::Conflict("Brand name already exists".to_string()));
            }
        }
        Ok(state.brands.rows.get_mut(&id).map(|brand| {
            brand.apply(update, Utc::now());
            brand.clone()
        }))
    }

    async fn delete_brand(&self, id: i32) -> StorageResult<bool> {
        Ok(self.state.write().await.brands.rows.remove(&id).is_some())
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    async fn list_products(&self) -> StorageResult<Vec<ProductView>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .rows
            .values()
            .cloned()
            .map(ProductView::from)
            .collect())
    }

    async fn get_product(&self, id: i32) -> StorageResult<Option<ProductView>> {
        let state = self.state.read().await;
        Ok(state.products.rows.get(&id).cloned().map(ProductView::from))
    }

    async fn list_products_by_category(&self, category: &str) -> StorageResult<Vec<ProductView>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .rows
            .values()
            .filter(|p| p.category == category)
            .cloned()
            .map(ProductView::from)
            .collect())
    }

    async fn list_featured_products(&self) -> StorageResult<Vec<ProductView>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .rows
            .values()
            .filter(|p| p.is_featured)
            .take(FEATURED_LIMIT)
            .cloned()
            .map(ProductView::from)
            .collect())
    }

    async fn create_product(&self, product: NewProduct) -> StorageResult<ProductView> {
        let mut state = self.state.write().await;
        if state.products.rows.values().any(|p| p.sku == product.sku) {
            return Err(StorageError::Conflict("SKU already exists".to_string()));
        }
        let now = Utc::now();
        let created = state.products.insert_with(|id| Product {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            category: product.category,
            brand: product.brand,
            image_url: product.image_url,
            video_url: product.video_url,
            is_new: product.is_new,
            is_featured: product.is_featured,
            stock: product.stock,
            low_stock_threshold: product.low_stock_threshold,
            sku: product.sku,
            created_at: now,
        });
        Ok(ProductView::from(created.clone()))
    }

    async fn update_product(
        &self,
        id: i32,
        update: UpdateProduct,
    ) -> StorageResult<Option<ProductView>> {
        let mut state = self.state.write().await;
        if let Some(sku) = &update.sku {
            if state
                .products
                .rows
                .values()
                .any(|p| p.id != id && &p.sku == sku)
            {
                return Err(StorageError::Conflict("SKU already exists".to_string()));
            }
        }
        Ok(state.products.rows.get_mut(&id).map(|product| {
            product.apply(update);
            ProductView::from(product.clone())
        }))
    }

    async fn delete_product(&self, id: i32) -> StorageResult<bool> {
        Ok(self.state.write().await.products.rows.remove(&id).is_some())
    }

    // ------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------

    async fn list_cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItemWithProduct>> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .rows
            .values()
            .filter(|item| item.session_id == session_id)
            .filter_map(|item| {
                state
                    .products
                    .rows
                    .get(&item.product_id)
                    .map(|product| CartItemWithProduct {
                        item: item.clone(),
                        product: ProductView::from(product.clone()),
                    })
            })
            .collect())
    }

    async fn add_to_cart(&self, item: InsertCartItem) -> StorageResult<CartItem> {
        let mut state = self.state.write().await;
        let existing = state
            .cart_items
            .rows
            .values_mut()
            .find(|row| row.product_id == item.product_id && row.session_id == item.session_id);
        if let Some(row) = existing {
            row.quantity = row.quantity.saturating_add(item.quantity);
            return Ok(row.clone());
        }
        let now = Utc::now();
        Ok(state
            .cart_items
            .insert_with(|id| CartItem {
                id,
                product_id: item.product_id,
                quantity: item.quantity,
                session_id: item.session_id,
                created_at: now,
            })
            .clone())
    }

    async fn update_cart_item(&self, id: i32, quantity: i32) -> StorageResult<Option<CartItem>> {
        let mut state = self.state.write().await;
        Ok(state.cart_items.rows.get_mut(&id).map(|row| {
            row.quantity = quantity;
            row.clone()
        }))
    }

    async fn remove_cart_item(&self, id: i32) -> StorageResult<bool> {
        Ok(self.state.write().await.cart_items.rows.remove(&id).is_some())
    }

    async fn clear_cart(&self, session_id: &str) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        let before = state.cart_items.rows.len();
        state
            .cart_items
            .rows
            .retain(|_, item| item.session_id != session_id);
        Ok((before - state.cart_items.rows.len()) as u64)
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    async fn adjust_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> StorageResult<Option<ProductView>> {
        let mut state = self.state.write().await;

        let updated = match state.products.rows.get_mut(&adjustment.product_id) {
            Some(product) => {
                product.stock = next_stock(product.stock, adjustment.delta);
                product.clone()
            }
            None => return Ok(None),
        };

        let now = Utc::now();
        state.transactions.insert_with(|id| InventoryTransaction {
            id,
            product_id: adjustment.product_id,
            quantity: adjustment.delta,
            transaction_type: adjustment.transaction_type,
            notes: adjustment.notes,
            created_by: Some(adjustment.user_id),
            created_at: now,
        });

        Ok(Some(ProductView::from(updated)))
    }

    async fn list_low_stock(&self, limit: i64) -> StorageResult<Vec<ProductView>> {
        let state = self.state.read().await;
        let mut low: Vec<&Product> = state
            .products
            .rows
            .values()
            .filter(|p| p.stock <= p.low_stock_threshold)
            .collect();
        low.sort_by_key(|p| (p.stock, p.id));
        Ok(low
            .into_iter()
            .take(clamp_limit(limit))
            .cloned()
            .map(ProductView::from)
            .collect())
    }

    async fn list_transactions(
        &self,
        product_id: Option<i32>,
        limit: i64,
    ) -> StorageResult<Vec<InventoryTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .rows
            .values()
            .rev()
            .filter(|t| product_id.is_none_or(|id| t.product_id == id))
            .take(clamp_limit(limit))
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    async fn list_audit_logs(&self, filter: AuditLogFilter) -> StorageResult<Vec<AuditLog>> {
        let state = self.state.read().await;
        Ok(state
            .audit_logs
            .rows
            .values()
            .rev()
            .filter(|log| {
                filter
                    .table_name
                    .as_deref()
                    .is_none_or(|table| log.table_name == table)
            })
            .filter(|log| filter.record_id.is_none_or(|id| log.record_id == id))
            .take(clamp_limit(filter.limit))
            .cloned()
            .collect())
    }

    async fn create_audit_log(&self, entry: NewAuditLog) -> StorageResult<AuditLog> {
        #[cfg(test)]
        if self
            .fail_audit_writes
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StorageError::Backend("audit log write rejected".to_string()));
        }

        let mut state = self.state.write().await;
        let now = Utc::now();
        Ok(state
            .audit_logs
            .insert_with(|id| AuditLog {
                id,
                table_name: entry.table_name,
                record_id: entry.record_id,
                action: entry.action,
                old_data: entry.old_data,
                new_data: entry.new_data,
                user_id: entry.user_id,
                description: entry.description,
                created_at: now,
            })
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditAction, TransactionType};

    fn admin() -> NewUser {
        NewUser {
            username: "admin".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            is_admin: true,
        }
    }

    fn new_product(name: &str, sku: &str, stock: i32, threshold: i32) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: 8990,
            category: "roupas".to_string(),
            brand: None,
            image_url: None,
            video_url: None,
            is_new: false,
            is_featured: false,
            stock,
            low_stock_threshold: threshold,
            sku: sku.to_string(),
        }
    }

    fn cart_item(product_id: i32, session_id: &str, quantity: i32) -> InsertCartItem {
        InsertCartItem {
            product_id,
            session_id: session_id.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_seeded_store_has_admin_and_catalog() {
        let store = MemStorage::seeded(admin());
        let user = store.get_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert!(user.is_admin);
        assert_eq!(store.list_categories().await.unwrap().len(), 4);
        assert_eq!(store.list_brands().await.unwrap().len(), 2);
        assert_eq!(store.list_products().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let store = MemStorage::new();
        let a = store.create_product(new_product("A", "SKU-A", 1, 1)).await.unwrap();
        let b = store.create_product(new_product("B", "SKU-B", 1, 1)).await.unwrap();
        assert_eq!(a.product.id, 1);
        assert_eq!(b.product.id, 2);
        assert!(store.delete_product(2).await.unwrap());
        let c = store.create_product(new_product("C", "SKU-C", 1, 1)).await.unwrap();
        assert_eq!(c.product.id, 3);
    }

    #[tokio::test]
    async fn test_missing_ids_are_absent_not_errors() {
        let store = MemStorage::new();
        assert!(store.get_product(99).await.unwrap().is_none());
        assert!(store.get_category(99).await.unwrap().is_none());
        assert!(store
            .update_brand(99, UpdateBrand::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_category(99).await.unwrap());
        assert!(store.update_cart_item(99, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemStorage::seeded(admin());
        let err = store.create_user(admin()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_category_slug_conflicts() {
        let store = MemStorage::seeded(admin());
        let err = store
            .create_category(InsertCategory {
                name: "Outros Tênis".to_string(),
                description: None,
                image_url: None,
                slug: "tenis".to_string(),
                is_active: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let err = store
            .update_category(
                2,
                UpdateCategory {
                    slug: Some("tenis".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deleting_category_leaves_products() {
        let store = MemStorage::seeded(admin());
        assert!(store.delete_category(1).await.unwrap());
        let tenis = store.list_products_by_category("tenis").await.unwrap();
        assert_eq!(tenis.len(), 1);
    }

    #[tokio::test]
    async fn test_featured_is_bounded() {
        let store = MemStorage::new();
        for i in 0..6 {
            let mut p = new_product(&format!("P{i}"), &format!("SKU-{i}"), 1, 1);
            p.is_featured = true;
            store.create_product(p).await.unwrap();
        }
        store
            .create_product(new_product("Plain", "SKU-PLAIN", 1, 1))
            .await
            .unwrap();
        let featured = store.list_featured_products().await.unwrap();
        assert_eq!(featured.len(), FEATURED_LIMIT);
        assert!(featured.iter().all(|p| p.product.is_featured));
    }

    #[tokio::test]
    async fn test_repeated_add_to_cart_merges_rows() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 10, 2)).await.unwrap();
        for qty in [1, 2, 4] {
            store.add_to_cart(cart_item(1, "sess-1", qty)).await.unwrap();
        }
        let items = store.list_cart_items("sess-1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.quantity, 7);
        assert_eq!(items[0].product.product.id, 1);
    }

    #[tokio::test]
    async fn test_add_to_cart_saturates_at_i32_max() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 10, 2)).await.unwrap();
        store.add_to_cart(cart_item(1, "sess-1", i32::MAX - 1)).await.unwrap();
        let merged = store.add_to_cart(cart_item(1, "sess-1", 5)).await.unwrap();
        assert_eq!(merged.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn test_same_product_other_session_gets_own_row() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 10, 2)).await.unwrap();
        let a = store.add_to_cart(cart_item(1, "sess-1", 1)).await.unwrap();
        let b = store.add_to_cart(cart_item(1, "sess-2", 1)).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_clear_cart_only_touches_one_session() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 10, 2)).await.unwrap();
        store.create_product(new_product("B", "SKU-B", 10, 2)).await.unwrap();
        store.add_to_cart(cart_item(1, "sess-1", 1)).await.unwrap();
        store.add_to_cart(cart_item(2, "sess-1", 1)).await.unwrap();
        store.add_to_cart(cart_item(1, "sess-2", 3)).await.unwrap();

        assert_eq!(store.clear_cart("sess-1").await.unwrap(), 2);
        assert!(store.list_cart_items("sess-1").await.unwrap().is_empty());
        let other = store.list_cart_items("sess-2").await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].item.quantity, 3);
    }

    #[tokio::test]
    async fn test_cart_skips_deleted_products() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 10, 2)).await.unwrap();
        store.add_to_cart(cart_item(1, "sess-1", 1)).await.unwrap();
        store.delete_product(1).await.unwrap();
        assert!(store.list_cart_items("sess-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_removal_floors_at_zero_and_records_transaction() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 10, 5)).await.unwrap();

        let view = store
            .adjust_stock(StockAdjustment {
                product_id: 1,
                delta: -15,
                user_id: 1,
                transaction_type: TransactionType::Adjustment,
                notes: Some("inventário".to_string()),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.product.stock, 0);
        assert_eq!(view.stock_status, crate::models::StockStatus::OutOfStock);

        let txs = store.list_transactions(Some(1), 50).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].quantity, -15);
        assert_eq!(txs[0].created_by, Some(1));
    }

    #[tokio::test]
    async fn test_adjust_unknown_product_writes_nothing() {
        let store = MemStorage::new();
        let result = store
            .adjust_stock(StockAdjustment {
                product_id: 42,
                delta: 5,
                user_id: 1,
                transaction_type: TransactionType::Purchase,
                notes: None,
            })
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.list_transactions(None, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adjustments_do_not_lose_updates() {
        let store = std::sync::Arc::new(MemStorage::new());
        store.create_product(new_product("A", "SKU-A", 0, 5)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .adjust_stock(StockAdjustment {
                        product_id: 1,
                        delta: 2,
                        user_id: 1,
                        transaction_type: TransactionType::Purchase,
                        notes: None,
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let product = store.get_product(1).await.unwrap().unwrap();
        assert_eq!(product.product.stock, 100);
        assert_eq!(store.list_transactions(Some(1), 500).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_low_stock_uses_each_products_threshold() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 5, 5)).await.unwrap();
        store.create_product(new_product("B", "SKU-B", 6, 5)).await.unwrap();
        store.create_product(new_product("C", "SKU-C", 0, 2)).await.unwrap();
        store.create_product(new_product("D", "SKU-D", 9, 10)).await.unwrap();

        let low = store.list_low_stock(10).await.unwrap();
        let ids: Vec<i32> = low.iter().map(|p| p.product.id).collect();
        assert_eq!(ids, vec![3, 1, 4]);

        assert_eq!(store.list_low_stock(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transactions_most_recent_first_with_filter() {
        let store = MemStorage::new();
        store.create_product(new_product("A", "SKU-A", 5, 1)).await.unwrap();
        store.create_product(new_product("B", "SKU-B", 5, 1)).await.unwrap();
        for (product_id, delta) in [(1, 1), (2, 2), (1, 3)] {
            store
                .adjust_stock(StockAdjustment {
                    product_id,
                    delta,
                    user_id: 1,
                    transaction_type: TransactionType::Purchase,
                    notes: None,
                })
                .await
                .unwrap();
        }
        let all = store.list_transactions(None, 50).await.unwrap();
        let deltas: Vec<i32> = all.iter().map(|t| t.quantity).collect();
        assert_eq!(deltas, vec![3, 2, 1]);

        let only_a = store.list_transactions(Some(1), 50).await.unwrap();
        assert_eq!(only_a.len(), 2);
        assert_eq!(store.list_transactions(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_logs_filtering() {
        let store = MemStorage::new();
        for (table, record_id) in [("products", 1), ("brands", 1), ("products", 2)] {
            store
                .create_audit_log(NewAuditLog {
                    table_name: table.to_string(),
                    record_id,
                    action: AuditAction::Created,
                    old_data: None,
                    new_data: Some(serde_json::json!({ "id": record_id })),
                    user_id: Some(1),
                    description: None,
                })
                .await
                .unwrap();
        }

        let products = store
            .list_audit_logs(AuditLogFilter {
                table_name: Some("products".to_string()),
                record_id: None,
                limit: 100,
            })
            .await
            .unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].record_id, 2);

        let one = store
            .list_audit_logs(AuditLogFilter {
                table_name: Some("products".to_string()),
                record_id: Some(1),
                limit: 100,
            })
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
    }
}

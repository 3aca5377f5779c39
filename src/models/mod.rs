//! Data model shared by the storage backends and the HTTP layer.
//!
//! Row structs derive `sqlx::FromRow` so the Postgres backend can decode them
//! directly; the in-memory backend stores the same structs in maps.

pub mod audit;
pub mod cart;
pub mod catalog;
pub mod inventory;
pub mod product;
pub mod user;

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

pub use audit::{AuditAction, AuditLog, AuditLogFilter, AuditTable, NewAuditLog};
pub use cart::{CartItem, CartItemWithProduct, InsertCartItem, UpdateCartQuantity};
pub use catalog::{Brand, Category, InsertBrand, InsertCategory, UpdateBrand, UpdateCategory};
pub use inventory::{InventoryTransaction, StockAdjustment, TransactionType};
pub use product::{
    format_price, parse_price, InsertProduct, NewProduct, PriceParseError, Product, ProductView,
    StockStatus, UpdateProduct,
};
pub use user::{Credentials, NewUser, PublicUser, User};

/// Error returned when a stored enum column holds an unexpected value.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("slug").with_message(Cow::Borrowed(
            "Slug must contain only lowercase letters, numbers, and hyphens",
        )))
    }
}

//! Products, their display form and the BRL price format.

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Low-stock threshold applied when a product is created without one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: String,
    /// Price in centavos.
    pub price: i32,
    pub category: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub is_new: bool,
    pub is_featured: bool,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub sku: String,
    pub created_at: DateTime<Utc>,
}

/// Derived stock band. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn from_levels(stock: i32, low_stock_threshold: i32) -> Self {
        if stock <= 0 {
            StockStatus::OutOfStock
        } else if stock <= low_stock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

/// Product as returned by every read: the stored row plus the formatted
/// price and the computed stock status.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub formatted_price: String,
    pub stock_status: StockStatus,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            formatted_price: format_price(product.price),
            stock_status: StockStatus::from_levels(product.stock, product.low_stock_threshold),
            product,
        }
    }
}

/// Request body for POST /api/products
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InsertProduct {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i32,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub is_new: Option<bool>,
    pub is_featured: Option<bool>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    #[validate(range(min = 0, message = "Threshold cannot be negative"))]
    pub low_stock_threshold: Option<i32>,
    #[validate(length(min = 1, max = 64, message = "SKU must be 1 to 64 characters"))]
    pub sku: Option<String>,
}

/// Request body for PUT /api/products/:id.
///
/// Stock is not editable here; it only moves through inventory adjustments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i32>,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub is_new: Option<bool>,
    pub is_featured: Option<bool>,
    #[validate(range(min = 0, message = "Threshold cannot be negative"))]
    pub low_stock_threshold: Option<i32>,
    #[validate(length(min = 1, max = 64, message = "SKU must be 1 to 64 characters"))]
    pub sku: Option<String>,
}

/// Fully defaulted product ready for insertion.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: i32,
    pub category: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub is_new: bool,
    pub is_featured: bool,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub sku: String,
}

impl From<InsertProduct> for NewProduct {
    fn from(insert: InsertProduct) -> Self {
        Self {
            name: insert.name,
            description: insert.description,
            price: insert.price,
            category: insert.category,
            brand: insert.brand,
            image_url: insert.image_url,
            video_url: insert.video_url,
            is_new: insert.is_new.unwrap_or(false),
            is_featured: insert.is_featured.unwrap_or(false),
            stock: insert.stock.unwrap_or(0),
            low_stock_threshold: insert
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            sku: insert.sku.unwrap_or_else(generate_sku),
        }
    }
}

impl Product {
    pub fn apply(&mut self, update: UpdateProduct) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(brand) = update.brand {
            self.brand = Some(brand);
        }
        if let Some(image_url) = update.image_url {
            self.image_url = Some(image_url);
        }
        if let Some(video_url) = update.video_url {
            self.video_url = Some(video_url);
        }
        if let Some(is_new) = update.is_new {
            self.is_new = is_new;
        }
        if let Some(is_featured) = update.is_featured {
            self.is_featured = is_featured;
        }
        if let Some(threshold) = update.low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        if let Some(sku) = update.sku {
            self.sku = sku;
        }
    }
}

pub fn generate_sku() -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 8);
    format!("SKU-{}", suffix.to_uppercase())
}

// ============================================================================
// Price formatting
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("price is empty")]
    Empty,
    #[error("malformed price: {0}")]
    Malformed(String),
    #[error("price out of range")]
    OutOfRange,
}

/// Formats centavos as a BRL amount, e.g. `8990` -> `"R$ 89,90"` and
/// `123456` -> `"R$ 1.234,56"`.
pub fn format_price(cents: i32) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = i64::from(cents).unsigned_abs();
    let digits = (abs / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{:02}", sign, grouped, abs % 100)
}

/// Inverse of [`format_price`]. Accepts the `R$` prefix as optional and a
/// one or two digit decimal part.
pub fn parse_price(input: &str) -> Result<i32, PriceParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PriceParseError::Empty);
    }

    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let rest = rest.strip_prefix("R$").unwrap_or(rest);
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace());

    let (whole, fraction) = match rest.split_once(',') {
        Some((whole, fraction)) => (whole, fraction),
        None => (rest, ""),
    };

    let whole: String = whole.chars().filter(|c| *c != '.').collect();
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(PriceParseError::Malformed(input.to_string()));
    }
    if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(PriceParseError::Malformed(input.to_string()));
    }

    let reais: i64 = whole.parse().map_err(|_| PriceParseError::OutOfRange)?;
    let centavos: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().unwrap_or(0) * 10,
        _ => fraction.parse::<i64>().unwrap_or(0),
    };

    let total = reais
        .checked_mul(100)
        .and_then(|v| v.checked_add(centavos))
        .ok_or(PriceParseError::OutOfRange)?;
    let total = if negative { -total } else { total };
    i32::try_from(total).map_err(|_| PriceParseError::OutOfRange)
}

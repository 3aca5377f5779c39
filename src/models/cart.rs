use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::ProductView;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Cart row joined with the product it points at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemWithProduct {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: ProductView,
}

fn default_quantity() -> i32 {
    1
}

/// Request body for POST /api/cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InsertCartItem {
    pub product_id: i32,
    #[validate(length(min = 1, max = 128, message = "Session id is required"))]
    pub session_id: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Request body for PUT /api/cart/:id
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCartQuantity {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_cart_item_defaults_quantity() {
        let item: InsertCartItem = serde_json::from_value(serde_json::json!({
            "productId": 1,
            "sessionId": "sess-abc"
        }))
        .unwrap();
        assert_eq!(item.quantity, 1);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let update = UpdateCartQuantity { quantity: 0 };
        let errors = update.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
    }
}

//! Stock transition rule shared by both storage backends.

use serde::{Deserialize, Serialize};

/// Direction of an admin stock operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Add,
    Remove,
}

impl StockOperation {
    /// Signed delta for a positive requested amount.
    pub fn delta(self, quantity: i32) -> i32 {
        match self {
            StockOperation::Add => quantity,
            StockOperation::Remove => -quantity,
        }
    }
}

/// `max(0, current + delta)`. Oversized removals floor at zero instead of
/// failing.
pub fn next_stock(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).max(0)
}

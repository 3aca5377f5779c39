use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Sale,
    Adjustment,
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Sale => "sale",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Return => "return",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(TransactionType::Purchase),
            "sale" => Ok(TransactionType::Sale),
            "adjustment" => Ok(TransactionType::Adjustment),
            "return" => Ok(TransactionType::Return),
            other => Err(UnknownVariant {
                kind: "transaction type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Append-only stock ledger entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: i32,
    pub product_id: i32,
    /// Signed quantity as requested by the caller.
    pub quantity: i32,
    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,
    pub notes: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Input of `Storage::adjust_stock`.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub product_id: i32,
    pub delta: i32,
    pub user_id: i32,
    pub transaction_type: TransactionType,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_text_round_trip() {
        for ty in [
            TransactionType::Purchase,
            TransactionType::Sale,
            TransactionType::Adjustment,
            TransactionType::Return,
        ] {
            assert_eq!(ty.as_str().parse::<TransactionType>().unwrap(), ty);
        }
        assert!("refund".parse::<TransactionType>().is_err());
    }
}

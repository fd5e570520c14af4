//! Stock Transaction Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default page size for transaction listings
pub const DEFAULT_TRANSACTION_LIMIT: i64 = 100;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "UPPERCASE"))]
pub enum TransactionType {
    /// 入库
    In,
    /// 出库
    Out,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "IN",
            TransactionType::Out => "OUT",
        }
    }

    /// Signed effect of `quantity` units on the item's stock level
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::In => quantity,
            TransactionType::Out => -quantity,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown transaction type string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transaction type '{0}', expected IN or OUT")]
pub struct ParseTransactionTypeError(pub String);

impl FromStr for TransactionType {
    type Err = ParseTransactionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(TransactionType::In),
            "OUT" => Ok(TransactionType::Out),
            other => Err(ParseTransactionTypeError(other.to_string())),
        }
    }
}

/// Persisted stock transaction, with the item name resolved for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StockTransaction {
    pub id: i64,
    pub item_id: i64,
    /// `None` only if the item row vanished mid-query
    pub item_name: Option<String>,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
}

/// Record transaction payload
///
/// `transaction_type` is the raw `"IN"`/`"OUT"` string; the ledger parses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCreate {
    pub item_id: i64,
    pub transaction_type: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Transaction list filter
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionQuery {
    pub item_id: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_TRANSACTION_LIMIT
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            item_id: None,
            transaction_type: None,
            limit: DEFAULT_TRANSACTION_LIMIT,
        }
    }
}

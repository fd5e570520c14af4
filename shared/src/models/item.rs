//! Item Model

use serde::{Deserialize, Serialize};

/// Default reorder threshold for new items
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

/// Inventory item (库存商品)
///
/// `quantity` is owned by the ledger: it changes only as a side effect of
/// recording a stock transaction, or through the explicit force-set path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Item {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub price: f64,
    pub reorder_level: i64,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Item {
    /// At or below the reorder threshold
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Create item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCreate {
    pub sku: String,
    pub name: String,
    pub category: String,
    /// Opening stock
    #[serde(default)]
    pub quantity: i64,
    pub price: f64,
    pub reorder_level: Option<i64>,
    pub description: Option<String>,
}

/// Update item payload
///
/// No quantity here: stock moves through transactions or the force-set path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub reorder_level: Option<i64>,
    pub description: Option<String>,
}

/// Item list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemQuery {
    pub category: Option<String>,
    /// Only items at or below their reorder level
    #[serde(default)]
    pub low_stock: bool,
}

//! Analytics DTOs (read-only reporting)

use serde::{Deserialize, Serialize};

use super::StockTransaction;

/// Item at or below its reorder level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LowStockItem {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub shortage: i64,
}

/// Per-category totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total_items: i64,
    pub total_quantity: i64,
    pub total_value: f64,
}

/// Daily stock movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StockTrend {
    /// YYYY-MM-DD (UTC)
    pub date: String,
    pub stock_in: i64,
    pub stock_out: i64,
    pub net_change: i64,
}

/// Item ranked by stock value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub price: f64,
    pub total_value: f64,
}

/// Dashboard overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_items: i64,
    pub total_categories: i64,
    pub total_inventory_value: f64,
    pub low_stock_alerts: i64,
    pub recent_transactions: Vec<StockTransaction>,
}

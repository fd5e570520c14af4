//! Analytics queries (read-only)

use super::RepoResult;
use rust_decimal::prelude::*;
use shared::models::{
    CategorySummary, DashboardStats, Item, ItemQuery, LowStockItem, StockTrend, TopItem,
    TransactionQuery,
};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{item, transaction};

const DECIMAL_PLACES: u32 = 2;

/// Number of transactions shown on the dashboard
const DASHBOARD_RECENT: i64 = 5;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

fn stock_value(item: &Item) -> Decimal {
    to_decimal(item.price) * Decimal::from(item.quantity)
}

/// Items at or below their reorder level, largest shortage first
pub async fn low_stock(pool: &SqlitePool) -> RepoResult<Vec<LowStockItem>> {
    let items = sqlx::query_as::<_, LowStockItem>(
        "SELECT id, name, sku, category, quantity AS current_stock, reorder_level, \
         reorder_level - quantity AS shortage FROM item WHERE quantity <= reorder_level \
         ORDER BY shortage DESC, name",
    )
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Per-category item count, stock and value
pub async fn category_summary(pool: &SqlitePool) -> RepoResult<Vec<CategorySummary>> {
    let items = item::find_all(pool, &ItemQuery::default()).await?;

    let mut groups: BTreeMap<String, (i64, i64, Decimal)> = BTreeMap::new();
    for item in &items {
        let entry = groups
            .entry(item.category.clone())
            .or_insert((0, 0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += item.quantity;
        entry.2 += stock_value(item);
    }

    Ok(groups
        .into_iter()
        .map(|(category, (total_items, total_quantity, value))| CategorySummary {
            category,
            total_items,
            total_quantity,
            total_value: to_f64(value),
        })
        .collect())
}

/// Daily IN/OUT totals (UTC days) over the last `days` days, oldest first
pub async fn stock_trends(pool: &SqlitePool, days: i64) -> RepoResult<Vec<StockTrend>> {
    let since = shared::util::now_millis().saturating_sub(days.max(1).saturating_mul(MILLIS_PER_DAY));
    let trends = sqlx::query_as::<_, StockTrend>(
        "SELECT date(created_at / 1000, 'unixepoch') AS date, \
         COALESCE(SUM(CASE WHEN transaction_type = 'IN' THEN quantity ELSE 0 END), 0) AS stock_in, \
         COALESCE(SUM(CASE WHEN transaction_type = 'OUT' THEN quantity ELSE 0 END), 0) AS stock_out, \
         COALESCE(SUM(CASE WHEN transaction_type = 'IN' THEN quantity ELSE -quantity END), 0) AS net_change \
         FROM stock_transaction WHERE created_at >= ? GROUP BY 1 ORDER BY 1",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(trends)
}

/// Items ranked by `quantity * price`
pub async fn top_items_by_value(pool: &SqlitePool, limit: usize) -> RepoResult<Vec<TopItem>> {
    let items = item::find_all(pool, &ItemQuery::default()).await?;
    let mut ranked: Vec<(Decimal, Item)> = items.into_iter().map(|i| (stock_value(&i), i)).collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

    Ok(ranked
        .into_iter()
        .take(limit)
        .map(|(value, item)| TopItem {
            id: item.id,
            name: item.name,
            category: item.category,
            quantity: item.quantity,
            price: item.price,
            total_value: to_f64(value),
        })
        .collect())
}

/// Overview numbers plus the latest transactions
pub async fn dashboard(pool: &SqlitePool) -> RepoResult<DashboardStats> {
    let items = item::find_all(pool, &ItemQuery::default()).await?;
    let total_value: Decimal = items.iter().map(stock_value).sum();
    let total_categories = item::list_categories(pool).await?.len() as i64;
    let low_stock_alerts = items.iter().filter(|i| i.is_low_stock()).count() as i64;
    let recent_transactions = transaction::find_all(
        pool,
        &TransactionQuery {
            limit: DASHBOARD_RECENT,
            ..Default::default()
        },
    )
    .await?;

    Ok(DashboardStats {
        total_items: items.len() as i64,
        total_categories,
        total_inventory_value: to_f64(total_value),
        low_stock_alerts,
        recent_transactions,
    })
}

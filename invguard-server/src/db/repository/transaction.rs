//! Stock Transaction Repository (the ledger)
//!
//! `record` is the only path that moves stock: the conditional quantity update
//! and the transaction insert commit together or not at all.

use super::{RepoError, RepoResult};
use shared::models::{StockTransaction, TransactionCreate, TransactionQuery, TransactionType};
use sqlx::SqlitePool;

/// Upper bound for a single listing
pub const MAX_LIST_LIMIT: i64 = 1000;

const TRANSACTION_SELECT: &str = "SELECT t.id, t.item_id, i.name AS item_name, t.transaction_type, t.quantity, t.notes, t.created_by, t.created_at \
     FROM stock_transaction t LEFT JOIN item i ON i.id = t.item_id";

/// Record a stock movement
///
/// Errors: `InvalidArgument` (bad type, quantity <= 0, IN past `i64::MAX`),
/// `NotFound` (no such item), `InsufficientStock` (OUT larger than current quantity).
/// No state changes on error.
pub async fn record(
    pool: &SqlitePool,
    data: TransactionCreate,
    created_by: &str,
) -> RepoResult<StockTransaction> {
    let transaction_type: TransactionType = data
        .transaction_type
        .parse()
        .map_err(|e: shared::models::ParseTransactionTypeError| {
            RepoError::InvalidArgument(e.to_string())
        })?;
    if data.quantity <= 0 {
        return Err(RepoError::InvalidArgument(format!(
            "quantity must be positive, got {}",
            data.quantity
        )));
    }

    let delta = transaction_type.signed(data.quantity);
    let now = shared::util::now_millis();

    let mut tx = pool.begin().await?;

    // 条件更新：库存不足或溢出时不命中任何行
    // SQLite 整数溢出会静默转成 REAL，所以上限要在加法之前判断
    let updated = sqlx::query(
        "UPDATE item SET quantity = quantity + ?1, updated_at = ?2 \
         WHERE id = ?3 AND quantity + ?1 >= 0 AND quantity <= 9223372036854775807 - MAX(?1, 0)",
    )
    .bind(delta)
    .bind(now)
    .bind(data.item_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        let available = sqlx::query_scalar::<_, i64>("SELECT quantity FROM item WHERE id = ?")
            .bind(data.item_id)
            .fetch_optional(&mut *tx)
            .await?;
        // tx dropped here → rollback
        return Err(match available {
            None => RepoError::NotFound(format!("Item {} not found", data.item_id)),
            Some(available) if available.checked_add(delta).is_none() => {
                RepoError::InvalidArgument(format!(
                    "quantity {available} + {delta} overflows item {}",
                    data.item_id
                ))
            }
            Some(available) => RepoError::InsufficientStock {
                item_id: data.item_id,
                available,
                requested: data.quantity,
            },
        });
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO stock_transaction (item_id, transaction_type, quantity, notes, created_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(data.item_id)
    .bind(transaction_type)
    .bind(data.quantity)
    .bind(&data.notes)
    .bind(created_by)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        item_id = data.item_id,
        transaction_id = id,
        transaction_type = %transaction_type,
        quantity = data.quantity,
        "Stock transaction recorded"
    );

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to load recorded transaction".into()))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<StockTransaction>> {
    let transaction =
        sqlx::query_as::<_, StockTransaction>(&format!("{TRANSACTION_SELECT} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(transaction)
}

/// Newest first; `limit` is clamped to `1..=MAX_LIST_LIMIT`
pub async fn find_all(
    pool: &SqlitePool,
    query: &TransactionQuery,
) -> RepoResult<Vec<StockTransaction>> {
    let transactions = sqlx::query_as::<_, StockTransaction>(&format!(
        "{TRANSACTION_SELECT} WHERE (?1 IS NULL OR t.item_id = ?1) AND (?2 IS NULL OR t.transaction_type = ?2) \
         ORDER BY t.created_at DESC, t.id DESC LIMIT ?3"
    ))
    .bind(query.item_id)
    .bind(query.transaction_type)
    .bind(query.limit.clamp(1, MAX_LIST_LIMIT))
    .fetch_all(pool)
    .await?;
    Ok(transactions)
}

/// Remove a transaction row without touching the item's quantity
///
/// Returns the removed row.
pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<StockTransaction> {
    let transaction = find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Transaction {id} not found")))?;
    let rows = sqlx::query("DELETE FROM stock_transaction WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Transaction {id} not found")));
    }
    Ok(transaction)
}

/// Σ IN − Σ OUT over the persisted transactions of an item
pub async fn net_quantity(pool: &SqlitePool, item_id: i64) -> RepoResult<i64> {
    let net = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(CASE transaction_type WHEN 'IN' THEN quantity ELSE -quantity END), 0) \
         FROM stock_transaction WHERE item_id = ?",
    )
    .bind(item_id)
    .fetch_one(pool)
    .await?;
    Ok(net)
}

pub async fn count_for_item(pool: &SqlitePool, item_id: i64) -> RepoResult<i64> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stock_transaction WHERE item_id = ?")
            .bind(item_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

//! Item Repository

use super::{RepoError, RepoResult};
use shared::models::{DEFAULT_REORDER_LEVEL, Item, ItemCreate, ItemQuery, ItemUpdate};
use sqlx::SqlitePool;

const ITEM_SELECT: &str = "SELECT id, sku, name, category, quantity, price, reorder_level, description, created_at, updated_at FROM item";

fn require_text(field: &str, value: &str) -> RepoResult<()> {
    if value.trim().is_empty() {
        return Err(RepoError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_price(price: f64) -> RepoResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(RepoError::InvalidArgument(format!(
            "price must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> RepoResult<()> {
    if value < 0 {
        return Err(RepoError::InvalidArgument(format!(
            "{field} must be >= 0, got {value}"
        )));
    }
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(&format!("{ITEM_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(item)
}

pub async fn find_by_sku(pool: &SqlitePool, sku: &str) -> RepoResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(&format!("{ITEM_SELECT} WHERE sku = ? LIMIT 1"))
        .bind(sku)
        .fetch_optional(pool)
        .await?;
    Ok(item)
}

/// Items ordered by name, optionally filtered by category / low stock
pub async fn find_all(pool: &SqlitePool, query: &ItemQuery) -> RepoResult<Vec<Item>> {
    let items = sqlx::query_as::<_, Item>(&format!(
        "{ITEM_SELECT} WHERE (?1 IS NULL OR category = ?1) AND (?2 = 0 OR quantity <= reorder_level) ORDER BY name, id"
    ))
    .bind(query.category.as_deref())
    .bind(query.low_stock)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn list_categories(pool: &SqlitePool) -> RepoResult<Vec<String>> {
    let categories =
        sqlx::query_scalar::<_, String>("SELECT DISTINCT category FROM item ORDER BY category")
            .fetch_all(pool)
            .await?;
    Ok(categories)
}

pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM item")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn create(pool: &SqlitePool, data: ItemCreate) -> RepoResult<Item> {
    require_text("sku", &data.sku)?;
    require_text("name", &data.name)?;
    require_text("category", &data.category)?;
    require_price(data.price)?;
    require_non_negative("quantity", data.quantity)?;
    let reorder_level = data.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL);
    require_non_negative("reorder_level", reorder_level)?;

    let now = shared::util::now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO item (sku, name, category, quantity, price, reorder_level, description, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) RETURNING id",
    )
    .bind(data.sku.trim())
    .bind(data.name.trim())
    .bind(data.category.trim())
    .bind(data.quantity)
    .bind(data.price)
    .bind(reorder_level)
    .bind(&data.description)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match RepoError::from(e) {
        RepoError::Duplicate(_) => {
            RepoError::Duplicate(format!("SKU '{}' already exists", data.sku.trim()))
        }
        other => other,
    })?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create item".into()))
}

/// Partial field edit; never touches `quantity`
pub async fn update(pool: &SqlitePool, id: i64, data: ItemUpdate) -> RepoResult<Item> {
    if let Some(name) = &data.name {
        require_text("name", name)?;
    }
    if let Some(category) = &data.category {
        require_text("category", category)?;
    }
    if let Some(price) = data.price {
        require_price(price)?;
    }
    if let Some(reorder_level) = data.reorder_level {
        require_non_negative("reorder_level", reorder_level)?;
    }

    let rows = sqlx::query(
        "UPDATE item SET name = COALESCE(?1, name), category = COALESCE(?2, category), \
         price = COALESCE(?3, price), reorder_level = COALESCE(?4, reorder_level), \
         description = COALESCE(?5, description), updated_at = ?6 WHERE id = ?7",
    )
    .bind(data.name.as_deref().map(str::trim))
    .bind(data.category.as_deref().map(str::trim))
    .bind(data.price)
    .bind(data.reorder_level)
    .bind(&data.description)
    .bind(shared::util::now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Item {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Item {id} not found")))
}

/// Overwrite `quantity` directly, bypassing the ledger
///
/// Items edited this way no longer satisfy `quantity == Σ IN − Σ OUT`.
pub async fn force_set_quantity(pool: &SqlitePool, id: i64, quantity: i64) -> RepoResult<Item> {
    require_non_negative("quantity", quantity)?;
    let rows = sqlx::query("UPDATE item SET quantity = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(quantity)
        .bind(shared::util::now_millis())
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Item {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Item {id} not found")))
}

/// Delete an item and (via FK cascade) all of its transactions
///
/// Returns the removed row.
pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<Item> {
    let item = find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Item {id} not found")))?;
    let rows = sqlx::query("DELETE FROM item WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Item {id} not found")));
    }
    Ok(item)
}

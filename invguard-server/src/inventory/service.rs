//! Inventory service
//!
//! Every mutation writes the ledger first and audits second. An audit failure
//! is logged and swallowed: the ledger result is returned unchanged.

use std::sync::Arc;

use serde_json::Value;
use shared::models::{
    AuditAction, AuditEntry, CategorySummary, DashboardStats, Item, ItemCreate, ItemQuery,
    ItemUpdate, LowStockItem, StockTransaction, StockTrend, TopItem, TransactionCreate,
    TransactionQuery, UserAccount,
};
use sqlx::SqlitePool;

use crate::audit::diff::{self, RESOURCE_ITEM, RESOURCE_TRANSACTION};
use crate::audit::{AuditError, AuditRecorder};
use crate::db::Store;
use crate::db::repository::{RepoResult, analytics, item, transaction};

/// Acting principal, resolved by the caller's authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
}

impl From<&UserAccount> for Actor {
    fn from(user: &UserAccount) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Ledger + audit facade
#[derive(Debug, Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    audit: Arc<AuditRecorder>,
}

impl InventoryService {
    pub fn new(store: &Store, audit: Arc<AuditRecorder>) -> Self {
        Self {
            pool: store.pool.clone(),
            audit,
        }
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    /// 审计写入失败只记日志，不回滚主操作
    async fn audit_soft(
        &self,
        action: AuditAction,
        resource_type: &str,
        resource_id: i64,
        actor: &Actor,
        changes: Option<Value>,
    ) -> Option<AuditEntry> {
        match self
            .audit
            .record(action, resource_type, resource_id, actor.user_id, changes)
            .await
        {
            Ok(entry) => Some(entry),
            Err(AuditError::Storage(e)) => {
                tracing::warn!(
                    action = %action,
                    resource_type = %resource_type,
                    resource_id,
                    user_id = actor.user_id,
                    error = %e,
                    "Failed to write audit entry; mutation kept"
                );
                None
            }
        }
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub async fn create_item(&self, data: ItemCreate, actor: &Actor) -> RepoResult<Item> {
        let created = item::create(&self.pool, data).await?;
        tracing::info!(item_id = created.id, sku = %created.sku, user = %actor.username, "Item created");
        self.audit_soft(
            AuditAction::Create,
            RESOURCE_ITEM,
            created.id,
            actor,
            Some(diff::create_snapshot(&created)),
        )
        .await;
        Ok(created)
    }

    pub async fn update_item(&self, id: i64, data: ItemUpdate, actor: &Actor) -> RepoResult<Item> {
        let before = item::find_by_id(&self.pool, id).await?;
        let after = item::update(&self.pool, id, data).await?;
        let changes = before.map(|b| diff::create_diff(&b, &after));
        self.audit_soft(AuditAction::Update, RESOURCE_ITEM, id, actor, changes)
            .await;
        Ok(after)
    }

    /// Direct quantity edit outside the ledger (audited as an UPDATE)
    pub async fn force_set_quantity(&self, id: i64, quantity: i64, actor: &Actor) -> RepoResult<Item> {
        let before = item::find_by_id(&self.pool, id).await?;
        let after = item::force_set_quantity(&self.pool, id, quantity).await?;
        tracing::warn!(
            item_id = id,
            quantity,
            user = %actor.username,
            "Item quantity force-set outside the ledger"
        );
        let changes = before.map(|b| diff::create_diff(&b, &after));
        self.audit_soft(AuditAction::Update, RESOURCE_ITEM, id, actor, changes)
            .await;
        Ok(after)
    }

    /// Delete an item together with its transaction history
    pub async fn delete_item(&self, id: i64, actor: &Actor) -> RepoResult<Item> {
        let removed = item::delete(&self.pool, id).await?;
        tracing::info!(item_id = id, sku = %removed.sku, user = %actor.username, "Item deleted");
        self.audit_soft(
            AuditAction::Delete,
            RESOURCE_ITEM,
            id,
            actor,
            Some(diff::create_snapshot(&removed)),
        )
        .await;
        Ok(removed)
    }

    pub async fn get_item(&self, id: i64) -> RepoResult<Option<Item>> {
        item::find_by_id(&self.pool, id).await
    }

    pub async fn list_items(&self, query: &ItemQuery) -> RepoResult<Vec<Item>> {
        item::find_all(&self.pool, query).await
    }

    pub async fn list_categories(&self) -> RepoResult<Vec<String>> {
        item::list_categories(&self.pool).await
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub async fn record_transaction(
        &self,
        data: TransactionCreate,
        actor: &Actor,
    ) -> RepoResult<StockTransaction> {
        let recorded = transaction::record(&self.pool, data, &actor.username).await?;
        tracing::info!(
            item_id = recorded.item_id,
            transaction_id = recorded.id,
            transaction_type = %recorded.transaction_type,
            quantity = recorded.quantity,
            "Stock transaction recorded"
        );
        self.audit_soft(
            AuditAction::Create,
            RESOURCE_TRANSACTION,
            recorded.id,
            actor,
            Some(diff::create_snapshot(&recorded)),
        )
        .await;
        Ok(recorded)
    }

    /// Remove a transaction row; the item's quantity is left as is
    pub async fn delete_transaction(&self, id: i64, actor: &Actor) -> RepoResult<StockTransaction> {
        let removed = transaction::delete(&self.pool, id).await?;
        tracing::warn!(
            transaction_id = id,
            item_id = removed.item_id,
            user = %actor.username,
            "Transaction deleted without quantity compensation"
        );
        self.audit_soft(
            AuditAction::Delete,
            RESOURCE_TRANSACTION,
            id,
            actor,
            Some(diff::create_snapshot(&removed)),
        )
        .await;
        Ok(removed)
    }

    pub async fn get_transaction(&self, id: i64) -> RepoResult<Option<StockTransaction>> {
        transaction::find_by_id(&self.pool, id).await
    }

    pub async fn list_transactions(&self, query: &TransactionQuery) -> RepoResult<Vec<StockTransaction>> {
        transaction::find_all(&self.pool, query).await
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    pub async fn low_stock(&self) -> RepoResult<Vec<LowStockItem>> {
        analytics::low_stock(&self.pool).await
    }

    pub async fn category_summary(&self) -> RepoResult<Vec<CategorySummary>> {
        analytics::category_summary(&self.pool).await
    }

    pub async fn stock_trends(&self, days: i64) -> RepoResult<Vec<StockTrend>> {
        analytics::stock_trends(&self.pool, days).await
    }

    pub async fn top_items_by_value(&self, limit: usize) -> RepoResult<Vec<TopItem>> {
        analytics::top_items_by_value(&self.pool, limit).await
    }

    pub async fn dashboard(&self) -> RepoResult<DashboardStats> {
        analytics::dashboard(&self.pool).await
    }
}

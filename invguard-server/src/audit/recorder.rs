//! 审计记录器
//!
//! 先持久化，后通知。写入失败返回 [`AuditError`]，由调用方决定是否吞掉；
//! 通知失败永远不会影响写入结果。

use std::sync::Arc;

use shared::LiveUpdate;
use shared::models::{AuditAction, AuditEntry};
use sqlx::SqlitePool;

use super::sink::NotificationSink;
use crate::db::repository::{RepoError, audit};

pub use crate::db::repository::audit::DEFAULT_AUDIT_LIMIT;

/// 审计错误
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Failed to write audit entry: {0}")]
    Storage(#[from] RepoError),
}

/// Durable audit log with live-update fan-out
pub struct AuditRecorder {
    pool: SqlitePool,
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(pool: SqlitePool, sink: Arc<dyn NotificationSink>) -> Self {
        Self { pool, sink }
    }

    /// Append an entry, then publish `inventory_update`
    ///
    /// Not retried on failure.
    pub async fn record(
        &self,
        action: AuditAction,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
        changes: Option<serde_json::Value>,
    ) -> Result<AuditEntry, AuditError> {
        let entry = audit::append(
            &self.pool,
            action,
            resource_type,
            resource_id,
            user_id,
            changes.as_ref(),
        )
        .await?;

        tracing::debug!(
            audit_id = entry.id,
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = entry.resource_id,
            "Audit entry written"
        );

        self.sink.publish(&LiveUpdate::from_entry(&entry));
        Ok(entry)
    }

    /// Newest first; `None` → [`DEFAULT_AUDIT_LIMIT`]
    pub async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(audit::list_recent(&self.pool, limit.unwrap_or(DEFAULT_AUDIT_LIMIT)).await?)
    }

    /// Full history of one resource, newest first
    pub async fn list_for_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
    ) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(audit::list_for_resource(&self.pool, resource_type, resource_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::sink::{BroadcastSink, NullSink};
    use crate::db::repository::user;
    use crate::db::test_support::temp_store;
    use shared::INVENTORY_UPDATE_EVENT;
    use std::sync::Mutex;

    /// Records every published update
    #[derive(Default)]
    struct CapturingSink(Mutex<Vec<LiveUpdate>>);

    impl NotificationSink for CapturingSink {
        fn publish(&self, update: &LiveUpdate) {
            self.0.lock().unwrap().push(update.clone());
        }
    }

    #[tokio::test]
    async fn test_record_publishes_after_write() {
        let (_dir, store) = temp_store().await;
        let admin = user::find_by_username(&store.pool, "admin").await.unwrap().unwrap();
        let sink = Arc::new(CapturingSink::default());
        let recorder = AuditRecorder::new(store.pool.clone(), sink.clone());

        let entry = recorder
            .record(AuditAction::Update, "Item", 3, admin.id, Some(serde_json::json!({"changes": []})))
            .await
            .unwrap();

        let published = sink.0.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_name(), INVENTORY_UPDATE_EVENT);
        assert_eq!(published[0].event_type, "item_changed");
        assert_eq!(published[0].audit, entry);
    }

    #[tokio::test]
    async fn test_failed_write_publishes_nothing() {
        let (_dir, store) = temp_store().await;
        let sink = Arc::new(CapturingSink::default());
        let recorder = AuditRecorder::new(store.pool.clone(), sink.clone());

        // unknown principal violates the user_id foreign key
        let result = recorder.record(AuditAction::Create, "Item", 1, 9999, None).await;
        assert!(matches!(result, Err(AuditError::Storage(_))));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_without_subscribers() {
        let (_dir, store) = temp_store().await;
        let admin = user::find_by_username(&store.pool, "admin").await.unwrap().unwrap();

        for sink in [
            Arc::new(BroadcastSink::new()) as Arc<dyn NotificationSink>,
            Arc::new(NullSink),
        ] {
            let recorder = AuditRecorder::new(store.pool.clone(), sink);
            recorder
                .record(AuditAction::Delete, "Transaction", 1, admin.id, None)
                .await
                .unwrap();
        }

        let history = AuditRecorder::new(store.pool.clone(), Arc::new(NullSink))
            .list_for_resource("Transaction", 1)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
    }
}

//! Audit Log Repository
//!
//! Append-only: there is no update or delete function, and the schema rejects
//! both with triggers.

use super::{RepoError, RepoResult};
use shared::models::{AuditAction, AuditEntry};
use sqlx::SqlitePool;

/// Default page size for audit listings
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

const AUDIT_SELECT: &str = "SELECT a.id, a.action, a.resource_type, a.resource_id, a.user_id, u.username AS user_name, a.changes, a.timestamp \
     FROM audit_log a LEFT JOIN app_user u ON u.id = a.user_id";

/// Raw audit row (action and changes stored as TEXT)
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: i64,
    action: String,
    resource_type: String,
    resource_id: i64,
    user_id: i64,
    user_name: Option<String>,
    changes: Option<String>,
    timestamp: i64,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = RepoError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action: AuditAction = row.action.parse().map_err(RepoError::Database)?;
        let changes = row
            .changes
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepoError::Database(format!("Corrupt audit changes for entry {}: {e}", row.id)))?;
        Ok(AuditEntry {
            id: row.id,
            action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            user_id: row.user_id,
            user_name: row.user_name,
            changes,
            timestamp: row.timestamp,
        })
    }
}

fn into_entries(rows: Vec<AuditRow>) -> RepoResult<Vec<AuditEntry>> {
    rows.into_iter().map(AuditEntry::try_from).collect()
}

/// Durably append one entry and return it as stored
pub async fn append(
    pool: &SqlitePool,
    action: AuditAction,
    resource_type: &str,
    resource_id: i64,
    user_id: i64,
    changes: Option<&serde_json::Value>,
) -> RepoResult<AuditEntry> {
    let changes = changes
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepoError::InvalidArgument(format!("Unserializable audit changes: {e}")))?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO audit_log (action, resource_type, resource_id, user_id, changes, timestamp) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(action.as_str())
    .bind(resource_type)
    .bind(resource_id)
    .bind(user_id)
    .bind(changes)
    .bind(shared::util::now_millis())
    .fetch_one(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to load appended audit entry".into()))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<AuditEntry>> {
    let row = sqlx::query_as::<_, AuditRow>(&format!("{AUDIT_SELECT} WHERE a.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(AuditEntry::try_from).transpose()
}

/// Most recent entries, newest first
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<AuditEntry>> {
    let rows = sqlx::query_as::<_, AuditRow>(&format!(
        "{AUDIT_SELECT} ORDER BY a.timestamp DESC, a.id DESC LIMIT ?"
    ))
    .bind(limit.max(1))
    .fetch_all(pool)
    .await?;
    into_entries(rows)
}

/// History of one resource, newest first
pub async fn list_for_resource(
    pool: &SqlitePool,
    resource_type: &str,
    resource_id: i64,
) -> RepoResult<Vec<AuditEntry>> {
    let rows = sqlx::query_as::<_, AuditRow>(&format!(
        "{AUDIT_SELECT} WHERE a.resource_type = ? AND a.resource_id = ? ORDER BY a.timestamp DESC, a.id DESC"
    ))
    .bind(resource_type)
    .bind(resource_id)
    .fetch_all(pool)
    .await?;
    into_entries(rows)
}

pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_log")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

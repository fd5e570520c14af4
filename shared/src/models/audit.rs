//! Audit Entry Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 审计操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            other => Err(format!("Unknown audit action: {other}")),
        }
    }
}

/// 审计日志条目（不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: AuditAction,
    /// 资源类型（如 "Item", "Transaction"）
    pub resource_type: String,
    pub resource_id: i64,
    /// Acting principal
    pub user_id: i64,
    /// Resolved from `user_id` at query time
    pub user_name: Option<String>,
    /// Snapshot or diff of the affected fields
    pub changes: Option<serde_json::Value>,
    pub timestamp: i64,
}

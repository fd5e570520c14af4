//! Live-update notification payload
//!
//! Emitted after every durable audit write. Delivery is best-effort: the
//! audit log itself is the authoritative record.

use serde::{Deserialize, Serialize};

use crate::models::{AuditAction, AuditEntry};

/// Event name on the live-update channel
pub const INVENTORY_UPDATE_EVENT: &str = "inventory_update";

/// Payload of an `inventory_update` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    /// `"<resource_type>_changed"`, resource type lowercased
    pub event_type: String,
    pub action: AuditAction,
    pub resource_id: i64,
    pub audit: AuditEntry,
}

impl LiveUpdate {
    pub fn from_entry(entry: &AuditEntry) -> Self {
        Self {
            event_type: format!("{}_changed", entry.resource_type.to_lowercase()),
            action: entry.action,
            resource_id: entry.resource_id,
            audit: entry.clone(),
        }
    }

    /// Channel event name (always [`INVENTORY_UPDATE_EVENT`])
    pub fn event_name(&self) -> &'static str {
        INVENTORY_UPDATE_EVENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_is_lowercased_resource() {
        let entry = AuditEntry {
            id: 7,
            action: AuditAction::Update,
            resource_type: "Item".to_string(),
            resource_id: 3,
            user_id: 1,
            user_name: Some("admin".to_string()),
            changes: None,
            timestamp: 0,
        };
        let update = LiveUpdate::from_entry(&entry);
        assert_eq!(update.event_type, "item_changed");
        assert_eq!(update.action, AuditAction::Update);
        assert_eq!(update.resource_id, 3);
        assert_eq!(update.event_name(), "inventory_update");
    }
}

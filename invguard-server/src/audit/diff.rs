//! 审计 JSON 快照与差异
//!
//! CREATE/DELETE 记录过滤后的完整快照，UPDATE 记录字段级差异。
//! 浮点数使用容差比较，避免价格序列化精度误差产生假变更。

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// 浮点数比较容差
const FLOAT_EPSILON: f64 = 1e-9;

/// Resource tags used in the audit log
pub const RESOURCE_ITEM: &str = "Item";
pub const RESOURCE_TRANSACTION: &str = "Transaction";

/// Fields never written into audit payloads
const EXCLUDED_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// 字段变更记录
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if a.is_f64() || b.is_f64() {
        match (a.as_f64(), b.as_f64()) {
            (Some(fa), Some(fb)) => (fa - fb).abs() < FLOAT_EPSILON,
            _ => a == b,
        }
    } else {
        a == b
    }
}

/// 递归比较（浮点数使用容差）
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(va, vb)| values_equal(va, vb))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, va)| b.get(key).is_some_and(|vb| values_equal(va, vb)))
        }
        _ => a == b,
    }
}

fn diff_recursive(from: &Value, to: &Value, path: &str, changes: &mut Vec<FieldChange>) {
    if let (Value::Object(from_obj), Value::Object(to_obj)) = (from, to) {
        // BTreeSet: 输出按字段名排序，便于比对
        let keys: BTreeSet<&String> = from_obj.keys().chain(to_obj.keys()).collect();
        for key in keys {
            let field = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            let f = from_obj.get(key).unwrap_or(&Value::Null);
            let t = to_obj.get(key).unwrap_or(&Value::Null);
            diff_recursive(f, t, &field, changes);
        }
    } else if !values_equal(from, to) {
        changes.push(FieldChange {
            field: path.to_string(),
            from: from.clone(),
            to: to.clone(),
        });
    }
}

fn to_filtered_json<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(mut json) => {
            if let Value::Object(obj) = &mut json {
                for field in EXCLUDED_FIELDS {
                    obj.remove(*field);
                }
            }
            Some(json)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize audit payload");
            None
        }
    }
}

/// CREATE / DELETE 审计详情：过滤后的完整快照
pub fn create_snapshot<T: Serialize>(value: &T) -> Value {
    to_filtered_json(value).unwrap_or_else(|| json!({"error": "serialization_failed"}))
}

/// Field-level changes between two versions (excluded fields ignored)
pub fn field_changes<T: Serialize>(from: &T, to: &T) -> Vec<FieldChange> {
    let (Some(from_json), Some(to_json)) = (to_filtered_json(from), to_filtered_json(to)) else {
        return Vec::new();
    };
    let mut changes = Vec::new();
    diff_recursive(&from_json, &to_json, "", &mut changes);
    changes
}

/// UPDATE 审计详情
///
/// 格式：`{"changes": [{"field": "price", "from": 1200.0, "to": 1100.0}, ...]}`
pub fn create_diff<T: Serialize>(from: &T, to: &T) -> Value {
    let changes = field_changes(from, to);
    if changes.is_empty() {
        json!({"changes": [], "note": "no_changes_detected"})
    } else {
        json!({ "changes": changes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Item;

    fn item() -> Item {
        Item {
            id: 1,
            sku: "LAP001".into(),
            name: "Laptop".into(),
            category: "Electronics".into(),
            quantity: 15,
            price: 1200.0,
            reorder_level: 5,
            description: None,
            created_at: 100,
            updated_at: 100,
        }
    }

    #[test]
    fn test_snapshot_excludes_bookkeeping_fields() {
        let snapshot = create_snapshot(&item());
        let obj = snapshot.as_object().unwrap();
        assert_eq!(obj["sku"], "LAP001");
        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("created_at"));
        assert!(!obj.contains_key("updated_at"));
    }

    #[test]
    fn test_diff_reports_changed_fields_only() {
        let before = item();
        let mut after = item();
        after.price = 1100.0;
        after.description = Some("Refurbished".into());
        after.updated_at = 200;

        let changes = field_changes(&before, &after);
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["description", "price"]);
        assert_eq!(changes[1].from, json!(1200.0));
        assert_eq!(changes[1].to, json!(1100.0));
    }

    #[test]
    fn test_diff_float_tolerance() {
        let before = item();
        let mut after = item();
        after.price = 1200.0 + 1e-12;
        let diff = create_diff(&before, &after);
        assert!(diff["changes"].as_array().unwrap().is_empty());
        assert_eq!(diff["note"], "no_changes_detected");
    }

    #[test]
    fn test_nested_objects() {
        let from = json!({"meta": {"color": "red", "size": 1}});
        let to = json!({"meta": {"color": "blue", "size": 1}});
        let changes = field_changes(&from, &to);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "meta.color");
    }
}

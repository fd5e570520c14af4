//! 审计日志模块 - 不可变审计追踪 + 实时通知
//!
//! # 架构
//!
//! ```text
//! 库存变更 (InventoryService)
//!   └─ AuditRecorder::record()
//!        ├─ audit_log 表 (append-only，先落盘)
//!        └─ NotificationSink::publish(inventory_update)  (fire-and-forget)
//! ```
//!
//! 通知只在落盘成功后发出；没有订阅者或订阅者滞后都不会影响写入。

pub mod diff;
pub mod recorder;
pub mod sink;

pub use recorder::{AuditError, AuditRecorder};
pub use sink::{BroadcastSink, NotificationSink, NullSink};

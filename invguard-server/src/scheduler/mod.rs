//! 备份调度器
//!
//! 三个互相独立的定时循环，注册为 `TaskKind::Periodic`：
//!
//! - daily:   健康检查 → 备份 → 校验 → 通知，随后无条件执行保留清理
//! - hourly:  健康检查 + 最新备份新鲜度检查
//! - weekly:  保留清理 + 磁盘空间检查
//!
//! 单个周期内的 panic 在调度边界被捕获，循环只在 shutdown 时退出。

pub mod backup_scheduler;
pub mod health;
pub mod notify;

pub use backup_scheduler::{BackupScheduler, Cycle, CycleOutcome};
pub use health::{HealthProbe, HttpHealthProbe};
pub use notify::{LogNotifier, NotifyLevel, Notifier};

//! InvGuard Server - 库存台账、审计与备份
//!
//! # 架构概述
//!
//! - **台账** (`db::repository::transaction`): 库存数量 = 交易流水净值，原子写入
//! - **审计** (`audit`): 只追加的审计日志 + 实时通知 (`inventory_update`)
//! - **库存服务** (`inventory`): 每个变更操作之后写审计
//! - **备份** (`backup`): 快照、加密、校验、保留清理
//! - **调度** (`scheduler`): 健康检查门控的每日备份、每小时巡检、每周维护
//!
//! # 模块结构
//!
//! ```text
//! invguard-server/src/
//! ├── core/          # 配置、后台任务
//! ├── db/            # SQLite 存储、仓储层、初始数据
//! ├── audit/         # 审计记录器、diff、通知 sink
//! ├── inventory/     # 库存服务
//! ├── backup/        # 备份引擎、加密、校验、保留
//! ├── scheduler/     # 备份调度器
//! └── utils/         # 日志、时间
//! ```

pub mod audit;
pub mod backup;
pub mod core;
pub mod db;
pub mod inventory;
pub mod scheduler;
pub mod utils;

// Re-export 公共类型
pub use audit::{AuditRecorder, BroadcastSink, NotificationSink};
pub use backup::{BackupEngine, BackupError, BackupVerifier, Passphrase};
pub use core::{BackgroundTasks, Config, TaskKind};
pub use db::Store;
pub use db::repository::{RepoError, RepoResult};
pub use inventory::{Actor, InventoryService};
pub use scheduler::BackupScheduler;

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ____           ______                     __
   /  _/___ _   __/ ____/_  ______ __________/ /
   / // __ \ | / / / __/ / / / __ `/ ___/ __  /
 _/ // / / / |/ / /_/ / /_/ / /_/ / /  / /_/ /
/___/_/ /_/|___/\____/\__,_/\__,_/_/   \__,_/
    "#
    );
}

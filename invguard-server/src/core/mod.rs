//! 核心模块 - 配置与后台任务

pub mod config;
pub mod tasks;

pub use config::{Config, ConfigError, EncryptionBackend};
pub use tasks::{BackgroundTasks, TaskKind};

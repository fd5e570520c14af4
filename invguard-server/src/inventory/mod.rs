//! 库存业务层 - 账本写入 + 审计

pub mod service;

pub use service::{Actor, InventoryService};

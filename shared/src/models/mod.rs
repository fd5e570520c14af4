//! Data models
//!
//! Shared between invguard-server and API clients.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), all timestamps Unix millis.

pub mod analytics;
pub mod audit;
pub mod item;
pub mod transaction;
pub mod user;

// Re-exports
pub use analytics::*;
pub use audit::*;
pub use item::*;
pub use transaction::*;
pub use user::*;

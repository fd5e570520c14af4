//! Shared types for InvGuard
//!
//! Plain data types used by the server and by any client of its API:
//! inventory models, audit entries, analytics DTOs and the live-update payload.

pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use message::{LiveUpdate, INVENTORY_UPDATE_EVENT};
pub use serde::{Deserialize, Serialize};

//! Shared types for the floor runtime
//!
//! Domain data types (entity keys, bookings, tables, queues), error codes
//! with their HTTP mapping, and small utilities used across crates.

pub mod booking;
pub mod error;
pub mod floor;
pub mod key;
pub mod models;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use key::{EntityKey, EntityKind, KeyError};
pub use serde::{Deserialize, Serialize};

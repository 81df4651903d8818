//! Unified error system for the floor runtime
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified response envelope for collaborators
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Entity runtime errors
//! - 2xxx: Booking errors
//! - 3xxx: Settings / availability errors
//! - 4xxx: Table and floor errors
//! - 5xxx: Device authorization errors
//! - 6xxx: Print errors
//! - 7xxx: Offline sync errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::BookingNotFound);
//! let err = AppError::validation("party size must be at least 1")
//!     .with_detail("field", "party_size");
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(ErrorCode::ValidationFailed.code()));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};

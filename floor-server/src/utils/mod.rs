//! 工具模块
//!
//! - [`logger`] - 日志初始化 (tracing-subscriber + 按日滚动文件)
//! - 错误类型 re-export (from shared::error)

pub mod logger;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};

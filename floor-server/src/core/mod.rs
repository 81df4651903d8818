//! 核心模块 - 配置、状态和后台任务
//!
//! # 模块结构
//!
//! - [`Config`] - 节点配置
//! - [`FloorState`] - 节点状态 (运行时 + 配置)
//! - [`BackgroundTasks`] - 后台任务管理

pub mod config;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::{FloorState, build_runtime};
pub use tasks::{BackgroundTasks, TaskKind};

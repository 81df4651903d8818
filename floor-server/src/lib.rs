//! Floor Server - 餐厅楼面与预订运行时
//!
//! # 架构概述
//!
//! 每个业务对象 (预订、餐桌、候位队列、打印队列 ...) 是一个单线程执行的
//! 实体，状态持久化在嵌入式 redb 中，通过提醒 (reminder) 和定时器 (timer)
//! 驱动超时逻辑：
//!
//! - **运行时** (`runtime`): 实体激活、串行调度、持久化存储、提醒/定时器
//! - **预订** (`bookings`, `calendar`): 预订生命周期、日历索引、可订性计算、爽约检测
//! - **楼面** (`floor`): 平面图、餐桌状态机、排桌优化、候位队列
//! - **设备** (`devices`): 设备授权码流程
//! - **打印** (`printing`): 每台打印机的作业队列与退避重试
//! - **离线同步** (`offline_sync`): 设备离线操作的冲突处理与重放
//!
//! # 模块结构
//!
//! ```text
//! floor-server/src/
//! ├── runtime/       # 实体运行时 (store, scheduler, snapshot, journal)
//! ├── core/          # 配置、状态、后台任务
//! ├── bookings/      # 预订实体、爽约检测
//! ├── calendar/      # 预订设置、日历、可订性
//! ├── floor/         # 平面图、餐桌、优化器、候位
//! ├── devices/       # 设备授权
//! ├── printing/      # 打印作业与队列
//! ├── services/      # 协作方接口、预订编排服务
//! └── utils/         # 日志
//! ```

pub mod bookings;
pub mod calendar;
pub mod core;
pub mod devices;
pub mod floor;
pub mod offline_sync;
pub mod printing;
pub mod runtime;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use core::{BackgroundTasks, Config, FloorState};
pub use runtime::{EntityError, EntityResult, Runtime};
pub use services::ReservationService;
pub use utils::{AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 加载 .env 并初始化日志
///
/// 读取 `LOG_LEVEL` 和 `LOG_DIR`，日志目录不存在时自动创建。
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    if let Some(dir) = &log_dir {
        std::fs::create_dir_all(dir)?;
    }

    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ________
   / ____/ /___  ____  _____
  / /_  / / __ \/ __ \/ ___/
 / __/ / / /_/ / /_/ / /
/_/   /_/\____/\____/_/
    "#
    );
}

use std::sync::Arc;

use crate::bookings::{Booking, NoShowDetector};
use crate::calendar::{BookingCalendar, BookingSettingsEntity};
use crate::core::Config;
use crate::devices::DeviceAuth;
use crate::floor::{FloorPlan, Table, TableOptimizer, Waitlist};
use crate::offline_sync::OfflineSyncQueue;
use crate::printing::{PrintJob, PrintQueue};
use crate::runtime::{DurableStore, RedbStore, Runtime};
use crate::services::{
    GuestHistory, LocalSyncTarget, LogGuestHistory, LogNotifier, Notifier, ReservationService,
    SyncTarget,
};

/// 楼面节点状态 - 持有运行时和配置
///
/// 克隆成本极低（内部均为 Arc）。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | runtime | 实体运行时 (含 redb 存储、提醒调度) |
#[derive(Clone)]
pub struct FloorState {
    pub config: Config,
    pub runtime: Runtime,
}

impl FloorState {
    /// 打开 `{WORK_DIR}/floor.redb` 并构建运行时
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let db_path = config.db_path();
        let store = Arc::new(RedbStore::open(&db_path)?);
        tracing::info!(path = %db_path.display(), "Durable store opened");
        Ok(Self::with_store(config, store))
    }

    /// 使用给定存储构建（测试使用内存存储）
    pub fn with_store(config: &Config, store: Arc<dyn DurableStore>) -> Self {
        Self {
            config: config.clone(),
            runtime: build_runtime(config, store),
        }
    }

    pub fn reservations(&self, org: &str, site: &str) -> ReservationService {
        ReservationService::new(self.runtime.clone(), org, site)
    }
}

/// Register every entity kind and hand configs and collaborators to entities
pub fn build_runtime(config: &Config, store: Arc<dyn DurableStore>) -> Runtime {
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let guest_history: Arc<dyn GuestHistory> = Arc::new(LogGuestHistory);
    let sync_target: Arc<dyn SyncTarget> = Arc::new(LocalSyncTarget::new());

    Runtime::builder(store)
        .config(config.runtime.clone())
        .with_data(Arc::new(config.no_show.clone()))
        .with_data(Arc::new(config.device_auth.clone()))
        .with_data(Arc::new(config.print.clone()))
        .with_data(Arc::new(config.sync.clone()))
        .with_data(Arc::new(config.waitlist.clone()))
        .with_data(notifier)
        .with_data(guest_history)
        .with_data(sync_target)
        .register::<Booking>()
        .register::<BookingSettingsEntity>()
        .register::<BookingCalendar>()
        .register::<FloorPlan>()
        .register::<Table>()
        .register::<TableOptimizer>()
        .register::<Waitlist>()
        .register::<NoShowDetector>()
        .register::<DeviceAuth>()
        .register::<PrintJob>()
        .register::<PrintQueue>()
        .register::<OfflineSyncQueue>()
        .build()
}

//! 服务层
//!
//! - [`collaborators`] - 外部协作者接口（通知、客史、离线同步目标）
//! - [`reservations`] - 跨实体预订流程编排

pub mod collaborators;
pub mod reservations;

pub use collaborators::{
    GuestHistory, LocalSyncTarget, LogGuestHistory, LogNotifier, Notifier, SyncTarget,
};
pub use reservations::{NewBooking, Propagated, PropagationFailure, ReservationService};

//! Entity runtime
//!
//! Key-addressed, single-writer entity instances with durable state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   call(key, job)   ┌─────────────────────────────┐
//! │   Handles    │ ─────────────────► │ Runtime (registry: DashMap) │
//! └──────────────┘                    └──────────────┬──────────────┘
//!                                                    │ mpsc mailbox per key
//!                                     ┌──────────────▼──────────────┐
//!                                     │ actor task (owns entity)    │
//!                                     │  SnapshotCell │ Journal     │
//!                                     └──────────────┬──────────────┘
//!                                                    │
//!                                     ┌──────────────▼──────────────┐
//!                                     │ DurableStore (RedbStore)    │
//!                                     └─────────────────────────────┘
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`host`] | Registry, dispatch, actor loop, eviction |
//! | [`entity`] | `Entity` trait, `EntityContext`, `EntityRef` |
//! | [`snapshot`] | Snapshot-flavored state |
//! | [`journal`] | Event-sourced state |
//! | [`timers`] | Durable reminders, activation-scoped timers |
//! | [`store`] / [`redb_store`] | Persistence contracts and the redb backend |

pub mod clock;
pub mod entity;
pub mod error;
pub mod host;
pub mod journal;
pub mod redb_store;
pub mod snapshot;
pub mod store;
pub(crate) mod timers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::{Entity, EntityContext, EntityRef};
pub use error::{EntityError, EntityResult};
pub use host::{Runtime, RuntimeBuilder};
pub use journal::{Aggregate, EventRecord, Journal};
pub use redb_store::RedbStore;
pub use snapshot::SnapshotCell;
pub use store::{
    DurableStore, EventLogStore, ReminderRecord, ReminderStore, SnapshotStore, StoreError,
};

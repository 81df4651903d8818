//! Durable store contracts
//!
//! The runtime only talks to persistence through these traits. Keys are the
//! rendered [`EntityKey`](shared::EntityKey) strings; values are opaque JSON
//! blobs produced by the entity layer.
//!
//! | Trait | Shape | Used by |
//! |-------|-------|---------|
//! | [`SnapshotStore`] | key → blob | snapshot entities |
//! | [`EventLogStore`] | key → append-only `(version, blob)` log | event-sourced entities |
//! | [`ReminderStore`] | `(key, name)` → [`ReminderRecord`] | durable reminders |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version conflict on {stream}: expected {expected}, found {actual}")]
    VersionConflict {
        stream: String,
        expected: u64,
        actual: u64,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted reminder registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderRecord {
    /// Rendered entity key
    pub entity_key: String,
    pub name: String,
    /// Unix millis of the next firing
    pub due_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_ms: Option<i64>,
}

pub trait SnapshotStore: Send + Sync {
    fn read_snapshot(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Overwrite the snapshot; durable once this returns
    fn write_snapshot(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    fn clear_snapshot(&self, key: &str) -> StoreResult<()>;
}

pub trait EventLogStore: Send + Sync {
    /// All records of a stream in version order (versions start at 1)
    fn read_events(&self, stream: &str) -> StoreResult<Vec<(u64, Vec<u8>)>>;

    /// Append `events` after `expected_version`, returning the new version
    ///
    /// Fails with [`StoreError::VersionConflict`] when the stream has moved.
    fn append_events(
        &self,
        stream: &str,
        expected_version: u64,
        events: &[Vec<u8>],
    ) -> StoreResult<u64>;
}

pub trait ReminderStore: Send + Sync {
    fn upsert_reminder(&self, record: &ReminderRecord) -> StoreResult<()>;

    fn delete_reminder(&self, entity_key: &str, name: &str) -> StoreResult<()>;

    fn load_reminders(&self) -> StoreResult<Vec<ReminderRecord>>;
}

/// Everything the runtime needs from persistence
pub trait DurableStore: SnapshotStore + EventLogStore + ReminderStore {}

impl<T: SnapshotStore + EventLogStore + ReminderStore> DurableStore for T {}

//! redb-based durable store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `snapshots` | `entity_key` | JSON state | Snapshot entities |
//! | `events` | `(entity_key, version)` | JSON `EventRecord` | Event streams (append-only) |
//! | `stream_versions` | `entity_key` | `u64` | Head version per stream |
//! | `reminders` | `(entity_key, name)` | JSON `ReminderRecord` | Durable reminders |
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: once `commit()` returns the
//! write survives power loss, which is what the runtime's persistence
//! boundary relies on.

use super::store::{
    EventLogStore, ReminderRecord, ReminderStore, SnapshotStore, StoreError, StoreResult,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const SNAPSHOTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

const EVENTS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("events");

const STREAM_VERSIONS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("stream_versions");

const REMINDERS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("reminders");

/// Durable store backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Create all tables so read transactions never see a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SNAPSHOTS_TABLE)?;
            let _ = write_txn.open_table(EVENTS_TABLE)?;
            let _ = write_txn.open_table(STREAM_VERSIONS_TABLE)?;
            let _ = write_txn.open_table(REMINDERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Current head version of a stream (0 when empty)
    pub fn stream_version(&self, stream: &str) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STREAM_VERSIONS_TABLE)?;
        Ok(table.get(stream)?.map(|g| g.value()).unwrap_or(0))
    }
}

// ========== Snapshots ==========

impl SnapshotStore for RedbStore {
    fn read_snapshot(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SNAPSHOTS_TABLE)?;
        Ok(table.get(key)?.map(|g| g.value().to_vec()))
    }

    fn write_snapshot(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SNAPSHOTS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn clear_snapshot(&self, key: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SNAPSHOTS_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// ========== Event streams ==========

impl EventLogStore for RedbStore {
    fn read_events(&self, stream: &str) -> StoreResult<Vec<(u64, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        let range_start = (stream, 0u64);
        let range_end = (stream, u64::MAX);
        let mut events = Vec::new();
        for result in table.range(range_start..=range_end)? {
            let (key, value) = result?;
            events.push((key.value().1, value.value().to_vec()));
        }
        Ok(events)
    }

    fn append_events(
        &self,
        stream: &str,
        expected_version: u64,
        events: &[Vec<u8>],
    ) -> StoreResult<u64> {
        let write_txn = self.db.begin_write()?;
        let new_version = {
            let mut versions = write_txn.open_table(STREAM_VERSIONS_TABLE)?;
            let actual = versions.get(stream)?.map(|g| g.value()).unwrap_or(0);
            if actual != expected_version {
                return Err(StoreError::VersionConflict {
                    stream: stream.to_string(),
                    expected: expected_version,
                    actual,
                });
            }

            let mut table = write_txn.open_table(EVENTS_TABLE)?;
            let mut version = actual;
            for event in events {
                version += 1;
                table.insert((stream, version), event.as_slice())?;
            }
            versions.insert(stream, version)?;
            version
        };
        write_txn.commit()?;
        Ok(new_version)
    }
}

// ========== Reminders ==========

impl ReminderStore for RedbStore {
    fn upsert_reminder(&self, record: &ReminderRecord) -> StoreResult<()> {
        let value = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REMINDERS_TABLE)?;
            table.insert(
                (record.entity_key.as_str(), record.name.as_str()),
                value.as_slice(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_reminder(&self, entity_key: &str, name: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REMINDERS_TABLE)?;
            table.remove((entity_key, name))?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn load_reminders(&self) -> StoreResult<Vec<ReminderRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REMINDERS_TABLE)?;
        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_write_read_clear() {
        let store = RedbStore::open_in_memory().unwrap();
        assert!(store.read_snapshot("a/b/table/1").unwrap().is_none());

        store.write_snapshot("a/b/table/1", b"{\"x\":1}").unwrap();
        assert_eq!(
            store.read_snapshot("a/b/table/1").unwrap().as_deref(),
            Some(&b"{\"x\":1}"[..])
        );

        store.clear_snapshot("a/b/table/1").unwrap();
        assert!(store.read_snapshot("a/b/table/1").unwrap().is_none());
    }

    #[test]
    fn test_append_checks_expected_version() {
        let store = RedbStore::open_in_memory().unwrap();
        let v = store
            .append_events("s", 0, &[b"e1".to_vec(), b"e2".to_vec()])
            .unwrap();
        assert_eq!(v, 2);

        let err = store.append_events("s", 1, &[b"e3".to_vec()]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        assert_eq!(store.append_events("s", 2, &[b"e3".to_vec()]).unwrap(), 3);
        let events = store.read_events("s").unwrap();
        let versions: Vec<u64> = events.iter().map(|(v, _)| *v).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(events[2].1, b"e3".to_vec());
    }

    #[test]
    fn test_streams_are_isolated() {
        let store = RedbStore::open_in_memory().unwrap();
        store.append_events("a/s/booking/1", 0, &[b"x".to_vec()]).unwrap();
        store.append_events("a/s/booking/10", 0, &[b"y".to_vec()]).unwrap();

        assert_eq!(store.read_events("a/s/booking/1").unwrap().len(), 1);
        assert_eq!(store.stream_version("a/s/booking/10").unwrap(), 1);
        assert_eq!(store.stream_version("a/s/booking/2").unwrap(), 0);
    }

    #[test]
    fn test_reminder_upsert_and_delete() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut record = ReminderRecord {
            entity_key: "a/s/no-show-detector/default".into(),
            name: "no-show:b1".into(),
            due_at: 1_000,
            period_ms: None,
        };
        store.upsert_reminder(&record).unwrap();
        record.due_at = 2_000;
        store.upsert_reminder(&record).unwrap();

        let loaded = store.load_reminders().unwrap();
        assert_eq!(loaded, vec![record.clone()]);

        store
            .delete_reminder(&record.entity_key, &record.name)
            .unwrap();
        assert!(store.load_reminders().unwrap().is_empty());
    }
}

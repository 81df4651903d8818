//! Persistence across store reopen and runtime restart

use std::sync::Arc;

use chrono::{Days, NaiveTime, Utc};
use floor_server::bookings::NoShowHandle;
use floor_server::core::{Config, FloorState};
use floor_server::runtime::{
    DurableStore, RedbStore, ReminderRecord, ReminderStore, SnapshotStore,
};

fn config(dir: &tempfile::TempDir) -> Config {
    Config::with_work_dir(dir.path().to_string_lossy().to_string())
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("floor.redb");

    {
        let store = RedbStore::open(&path).unwrap();
        store
            .upsert_reminder(&ReminderRecord {
                entity_key: "acme:s1:no_show_detector".into(),
                name: "no-show:b1".into(),
                due_at: 1_900_000_000_000,
                period_ms: None,
            })
            .unwrap();
        store.write_snapshot("acme:s1:table:t1", b"{}").unwrap();
    }

    let store = RedbStore::open(&path).unwrap();
    let reminders = store.load_reminders().unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].name, "no-show:b1");
    assert_eq!(
        store.read_snapshot("acme:s1:table:t1").unwrap().as_deref(),
        Some(&b"{}"[..])
    );
}

#[tokio::test]
async fn test_initialize_creates_work_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("data").join("floor");
    let config = Config::with_work_dir(nested.to_string_lossy().to_string());

    let state = FloorState::initialize(&config).unwrap();
    assert!(config.db_path().exists());
    assert_eq!(state.runtime.restore_reminders().unwrap(), 0);
    state.runtime.shutdown();
}

#[tokio::test]
async fn test_reminders_restored_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store: Arc<dyn DurableStore> = Arc::new(RedbStore::open_in_memory().unwrap());
    let service_time = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(30))
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(20, 0, 0).unwrap());

    let first = FloorState::with_store(&config, store.clone());
    NoShowHandle::new(&first.runtime, "acme", "s1")
        .register_booking("b1", service_time)
        .await
        .unwrap();
    first.runtime.shutdown();
    drop(first);

    let second = FloorState::with_store(&config, store.clone());
    assert_eq!(second.runtime.restore_reminders().unwrap(), 1);

    let detector = NoShowHandle::new(&second.runtime, "acme", "s1");
    let watched = detector.get_state().await.unwrap().watched;
    assert_eq!(watched.len(), 1);
    assert_eq!(watched[0].booking_id, "b1");

    detector.unregister_booking("b1").await.unwrap();
    assert!(store.load_reminders().unwrap().is_empty());
    second.runtime.shutdown();
}

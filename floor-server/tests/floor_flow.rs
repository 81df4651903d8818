//! End-to-end flows through a fully wired runtime

use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use floor_server::bookings::NoShowHandle;
use floor_server::bookings::actions::CancelBooking;
use floor_server::calendar::{CalendarHandle, SettingsHandle};
use floor_server::core::{Config, FloorState};
use floor_server::devices::DeviceAuthHandle;
use floor_server::offline_sync::OfflineSyncHandle;
use floor_server::printing::PrintQueueHandle;
use floor_server::runtime::RedbStore;
use floor_server::services::NewBooking;
use shared::booking::{AvailabilityRequest, BookingSource, BookingStatus, GuestInfo};
use shared::models::device::{DeviceAuthInitiate, PollOutcome};
use shared::models::print::{PrintJobCreate, PrintJobStatus, PrintOutcome};
use shared::models::sync::{SyncAction, SyncOperationInput, SyncOperationStatus};

fn state() -> (FloorState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_work_dir(dir.path().to_string_lossy().to_string());
    let store = Arc::new(RedbStore::open_in_memory().unwrap());
    (FloorState::with_store(&config, store), dir)
}

fn service_day() -> NaiveDate {
    Utc::now().date_naive().checked_add_days(Days::new(7)).unwrap()
}

fn at(date: NaiveDate, h: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
}

#[tokio::test]
async fn test_booking_lifecycle_through_service() {
    let (state, _dir) = state();
    SettingsHandle::new(&state.runtime, "acme", "s1")
        .initialize(None)
        .await
        .unwrap();
    let service = state.reservations("acme", "s1");
    let day = service_day();

    let availability = service
        .check_availability(
            day,
            AvailabilityRequest {
                party_size: 2,
                preferred_time: Some(NaiveTime::from_hms_opt(20, 0, 0).unwrap()),
                duration_minutes: None,
                source: BookingSource::Website,
                now: None,
                seating_preference: None,
                is_vip: false,
            },
        )
        .await
        .unwrap();
    let slot = availability
        .slot(NaiveTime::from_hms_opt(20, 0, 0).unwrap())
        .unwrap();
    assert!(slot.available, "{:?}", slot.reason);

    let created = service
        .create_booking(NewBooking {
            guest: GuestInfo {
                name: "Lucía".into(),
                phone: Some("+34600000000".into()),
                ..Default::default()
            },
            party_size: 2,
            time: at(day, 20),
            duration_minutes: None,
            source: BookingSource::Website,
            special_requests: None,
            seating_preference: None,
        })
        .await
        .unwrap();
    assert!(created.is_complete(), "{:?}", created.failures);
    let id = created.value.booking_id.clone();

    service.confirm(&id).await.unwrap();
    let cancelled = service
        .cancel(
            &id,
            CancelBooking {
                reason: Some("plans changed".into()),
                cancelled_by: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.value.status, BookingStatus::Cancelled);

    let calendar = CalendarHandle::new(&state.runtime, "acme", "s1", day)
        .get()
        .await
        .unwrap();
    assert_eq!(calendar.find(&id).unwrap().status, BookingStatus::Cancelled);

    let watched = NoShowHandle::new(&state.runtime, "acme", "s1")
        .get_state()
        .await
        .unwrap()
        .watched;
    assert!(watched.is_empty());
    state.runtime.shutdown();
}

#[tokio::test]
async fn test_print_queue_round_trip() {
    let (state, _dir) = state();
    let queue = PrintQueueHandle::new(&state.runtime, "acme", "s1", "kitchen");

    let job = queue
        .submit(PrintJobCreate {
            printer_id: String::new(),
            kind: Default::default(),
            content: "2x paella".into(),
            priority: 0,
        })
        .await
        .unwrap();
    assert_eq!(job.printer_id, "kitchen");

    let started = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(started.job_id, job.job_id);
    assert_eq!(started.status, PrintJobStatus::Printing);

    let done = queue.report(&job.job_id, PrintOutcome::Printed).await.unwrap();
    assert_eq!(done.status, PrintJobStatus::Completed);
    assert!(queue.dequeue().await.unwrap().is_none());
    state.runtime.shutdown();
}

#[tokio::test]
async fn test_device_pairing() {
    let (state, _dir) = state();
    let grant = DeviceAuthHandle::initiate(
        &state.runtime,
        "acme",
        DeviceAuthInitiate {
            client_id: "pos-terminal".into(),
            device_name: Some("Bar tablet".into()),
            scope: None,
        },
    )
    .await
    .unwrap();

    let auth = DeviceAuthHandle::new(&state.runtime, "acme", &grant.user_code);
    assert_eq!(auth.poll(&grant.device_code).await.unwrap(), PollOutcome::Pending);
    auth.authorize("manager", Some("s1".into())).await.unwrap();
    assert_eq!(
        auth.poll(&grant.device_code).await.unwrap(),
        PollOutcome::Authorized {
            authorized_by: "manager".into(),
            site: Some("s1".into()),
        }
    );
    state.runtime.shutdown();
}

#[tokio::test]
async fn test_offline_ops_replay_against_local_target() {
    let (state, _dir) = state();
    let sync = OfflineSyncHandle::new(&state.runtime, "acme", "s1", "tablet-1");
    sync.initialize(None).await.unwrap();

    sync.enqueue(SyncOperationInput {
        resource: "table".into(),
        resource_id: "t9".into(),
        action: SyncAction::Create,
        payload: serde_json::json!({ "number": "9" }),
        client_version: 0,
    })
    .await
    .unwrap();

    let report = sync.process().await.unwrap();
    assert_eq!(report.applied, 1);
    let ops = sync.get_state().await.unwrap().operations;
    assert_eq!(ops[0].status, SyncOperationStatus::Applied);
    assert!(sync.outstanding().await.unwrap().is_empty());
    state.runtime.shutdown();
}

//! Reservation Service - cross-entity booking flows
//!
//! Every flow runs the booking command first. When it succeeds, the other
//! entities (calendar, tables, no-show detector, collaborators) are brought
//! in line one call at a time. A failed propagation is logged and reported
//! in [`Propagated::failures`]; it never undoes the booking transition.

use crate::bookings::BookingHandle;
use crate::bookings::NoShowHandle;
use crate::bookings::actions::{AssignTable, CancelBooking, ModifyBooking, RequestBooking, SeatGuest};
use crate::calendar::{CalendarHandle, SettingsHandle};
use crate::floor::{OptimizerHandle, TableHandle};
use crate::runtime::{EntityError, EntityResult, Runtime};
use crate::services::collaborators::{
    GuestHistory, Notification, NotificationKind, Notifier, VisitOutcome,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use shared::EntityKey;
use shared::booking::{
    AvailabilityRequest, AvailabilityResult, BookingReference, BookingSnapshot, BookingSource,
    BookingStatus, DepositStatus, GuestInfo, ReferenceUpdate,
};
use shared::floor::{AssignmentRequest, TableStatus};
use shared::util::new_id;

/// A propagation step that did not go through
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationFailure {
    pub step: &'static str,
    pub error: EntityError,
}

/// Result of the primary command plus the propagations that failed
#[derive(Debug, Clone)]
pub struct Propagated<T> {
    pub value: T,
    pub failures: Vec<PropagationFailure>,
}

impl<T> Propagated<T> {
    /// Every propagation step succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_steps(&self) -> Vec<&'static str> {
        self.failures.iter().map(|f| f.step).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub guest: GuestInfo,
    pub party_size: u32,
    /// Venue-local
    pub time: NaiveDateTime,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub source: BookingSource,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub seating_preference: Option<String>,
}

/// Collects failed propagation steps for one flow
struct Steps {
    booking_id: String,
    failures: Vec<PropagationFailure>,
}

impl Steps {
    fn new(booking_id: &str) -> Self {
        Self {
            booking_id: booking_id.to_string(),
            failures: Vec::new(),
        }
    }

    fn check<T>(&mut self, step: &'static str, result: EntityResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(error) => {
                tracing::warn!(booking_id = %self.booking_id, step, error = %error, "Propagation failed");
                self.failures.push(PropagationFailure { step, error });
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Propagated<T> {
        Propagated {
            value,
            failures: self.failures,
        }
    }
}

fn reference_of(booking: &BookingSnapshot) -> BookingReference {
    BookingReference {
        booking_id: booking.booking_id.clone(),
        confirmation_code: booking.confirmation_code.clone(),
        time: booking.time.time(),
        party_size: booking.party_size,
        guest_name: booking.guest.name.clone(),
        status: booking.status,
        table_id: booking.table_id.clone(),
        table_number: booking.table_number.clone(),
        duration_minutes: booking.duration_minutes,
        source: Some(booking.source),
    }
}

fn status_update(status: BookingStatus) -> ReferenceUpdate {
    ReferenceUpdate {
        status: Some(status),
        ..Default::default()
    }
}

/// Reservation flows for one site
#[derive(Clone)]
pub struct ReservationService {
    runtime: Runtime,
    org: String,
    site: String,
}

impl ReservationService {
    pub fn new(runtime: Runtime, org: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            runtime,
            org: org.into(),
            site: site.into(),
        }
    }

    fn booking(&self, booking_id: &str) -> BookingHandle {
        BookingHandle::new(&self.runtime, EntityKey::booking(&self.org, &self.site, booking_id))
    }

    fn calendar(&self, date: NaiveDate) -> CalendarHandle {
        CalendarHandle::new(&self.runtime, &self.org, &self.site, date)
    }

    fn table(&self, table_id: &str) -> TableHandle {
        TableHandle::new(&self.runtime, &self.org, &self.site, table_id)
    }

    fn settings(&self) -> SettingsHandle {
        SettingsHandle::new(&self.runtime, &self.org, &self.site)
    }

    fn no_show(&self) -> NoShowHandle {
        NoShowHandle::new(&self.runtime, &self.org, &self.site)
    }

    async fn notify(&self, kind: NotificationKind, booking: &BookingSnapshot, message: String) {
        let Some(notifier) = self.runtime.data::<dyn Notifier>() else {
            return;
        };
        let notification = Notification {
            kind,
            subject_id: booking.booking_id.clone(),
            site: self.site.clone(),
            guest_name: booking.guest.name.clone(),
            phone: booking.guest.phone.clone(),
            email: booking.guest.email.clone(),
            message,
        };
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(booking_id = %booking.booking_id, error = %e, "Notification failed");
        }
    }

    async fn record_visit(&self, booking: &BookingSnapshot, outcome: VisitOutcome) {
        let Some(history) = self.runtime.data::<dyn GuestHistory>() else {
            return;
        };
        if let Err(e) = history
            .record(&self.org, &booking.guest, &booking.booking_id, booking.party_size, outcome)
            .await
        {
            tracing::warn!(booking_id = %booking.booking_id, error = %e, "Guest history update failed");
        }
    }

    pub async fn check_availability(
        &self,
        date: NaiveDate,
        request: AvailabilityRequest,
    ) -> EntityResult<AvailabilityResult> {
        self.calendar(date).check_availability(request).await
    }

    /// Booking, then calendar reference, no-show check and deposit policy
    pub async fn create_booking(&self, input: NewBooking) -> EntityResult<Propagated<BookingSnapshot>> {
        if input.party_size == 0 {
            return Err(EntityError::validation("party_size must be positive"));
        }
        let date = input.time.date();
        let availability = self
            .check_availability(
                date,
                AvailabilityRequest {
                    party_size: input.party_size,
                    preferred_time: Some(input.time.time()),
                    duration_minutes: input.duration_minutes,
                    source: input.source,
                    now: None,
                    seating_preference: input.seating_preference.clone(),
                    is_vip: input.guest.is_vip,
                },
            )
            .await?;
        match availability.slot(input.time.time()) {
            Some(slot) if slot.available => {}
            Some(slot) => {
                return Err(EntityError::validation(format!(
                    "{} is not available ({:?})",
                    input.time,
                    slot.reason
                )));
            }
            None => {
                return Err(EntityError::validation(format!(
                    "{} is outside booking hours",
                    input.time
                )));
            }
        }

        let booking_id = new_id();
        let booking = self.booking(&booking_id);
        let mut snapshot = booking
            .request(RequestBooking {
                guest: input.guest,
                party_size: input.party_size,
                time: input.time,
                duration_minutes: input.duration_minutes,
                source: input.source,
                special_requests: input.special_requests,
                confirmation_code: None,
            })
            .await?;
        tracing::info!(
            booking_id = %booking_id,
            code = %snapshot.confirmation_code,
            party_size = snapshot.party_size,
            time = %snapshot.time,
            "Booking created"
        );

        let mut steps = Steps::new(&booking_id);
        steps.check(
            "calendar",
            self.calendar(date).add_reference(reference_of(&snapshot)).await,
        );
        steps.check(
            "no_show",
            self.no_show().register_booking(&booking_id, snapshot.time).await,
        );

        let deposit = match self.settings().get().await {
            Ok(settings) => settings.deposit_for(snapshot.party_size),
            Err(e) => {
                steps.check::<()>("deposit", Err(e));
                None
            }
        };
        if let Some(amount) = deposit
            && let Some(updated) = steps.check("deposit", booking.require_deposit(amount).await)
        {
            snapshot = updated;
            self.notify(
                NotificationKind::DepositRequired,
                &snapshot,
                format!("A deposit of {amount} secures booking {}", snapshot.confirmation_code),
            )
            .await;
        }
        Ok(steps.finish(snapshot))
    }

    pub async fn confirm(&self, booking_id: &str) -> EntityResult<Propagated<BookingSnapshot>> {
        let snapshot = self.booking(booking_id).confirm().await?;
        let mut steps = Steps::new(booking_id);
        steps.check(
            "calendar",
            self.calendar(snapshot.date())
                .update_reference(booking_id, status_update(BookingStatus::Confirmed))
                .await,
        );
        self.notify(
            NotificationKind::BookingConfirmed,
            &snapshot,
            format!("Booking {} is confirmed for {}", snapshot.confirmation_code, snapshot.time),
        )
        .await;
        Ok(steps.finish(snapshot))
    }

    /// A date change moves the calendar reference between days
    pub async fn modify(
        &self,
        booking_id: &str,
        cmd: ModifyBooking,
    ) -> EntityResult<Propagated<BookingSnapshot>> {
        let booking = self.booking(booking_id);
        let before = booking.get_state().await?;
        let after = booking.modify(cmd).await?;
        let mut steps = Steps::new(booking_id);

        if before.date() != after.date() {
            steps.check(
                "calendar_remove",
                self.calendar(before.date()).remove_reference(booking_id).await,
            );
            steps.check(
                "calendar_add",
                self.calendar(after.date()).add_reference(reference_of(&after)).await,
            );
        } else {
            let update = ReferenceUpdate {
                time: Some(after.time.time()),
                party_size: Some(after.party_size),
                duration_minutes: after.duration_minutes,
                ..Default::default()
            };
            steps.check(
                "calendar",
                self.calendar(after.date()).update_reference(booking_id, update).await,
            );
        }
        if before.time != after.time && after.status.is_awaiting_arrival() {
            steps.check(
                "no_show",
                self.no_show().register_booking(booking_id, after.time).await,
            );
        }
        Ok(steps.finish(after))
    }

    /// Releases a held table and refunds a paid deposit
    pub async fn cancel(
        &self,
        booking_id: &str,
        cmd: CancelBooking,
    ) -> EntityResult<Propagated<BookingSnapshot>> {
        let booking = self.booking(booking_id);
        let mut snapshot = booking.cancel(cmd).await?;
        let mut steps = Steps::new(booking_id);

        steps.check(
            "calendar",
            self.calendar(snapshot.date())
                .update_reference(booking_id, status_update(BookingStatus::Cancelled))
                .await,
        );
        steps.check("no_show", self.no_show().unregister_booking(booking_id).await);

        if let Some(table_id) = snapshot.table_id.clone() {
            let table = self.table(&table_id);
            if let Some(state) = steps.check("table", table.get_state().await)
                && state.status == TableStatus::Reserved
                && state.current_booking_id.as_deref() == Some(booking_id)
            {
                steps.check("table", table.release().await);
            }
        }
        if snapshot
            .deposit
            .as_ref()
            .is_some_and(|d| d.status == DepositStatus::Paid)
            && let Some(updated) = steps.check("deposit", booking.refund_deposit().await)
        {
            snapshot = updated;
        }

        self.record_visit(&snapshot, VisitOutcome::Cancelled).await;
        self.notify(
            NotificationKind::BookingCancelled,
            &snapshot,
            format!("Booking {} was cancelled", snapshot.confirmation_code),
        )
        .await;
        Ok(steps.finish(snapshot))
    }

    /// Hold a table for the booking ahead of arrival
    pub async fn assign_table(
        &self,
        booking_id: &str,
        table_id: &str,
    ) -> EntityResult<Propagated<BookingSnapshot>> {
        let table = self.table(table_id);
        let number = table.get_state().await?.number;
        let snapshot = self
            .booking(booking_id)
            .assign_table(AssignTable {
                table_id: table_id.to_string(),
                table_number: number.clone(),
            })
            .await?;
        let mut steps = Steps::new(booking_id);
        steps.check("table", table.reserve(booking_id).await);
        let update = ReferenceUpdate {
            table: Some(Some((table_id.to_string(), number))),
            ..Default::default()
        };
        steps.check(
            "calendar",
            self.calendar(snapshot.date()).update_reference(booking_id, update).await,
        );
        Ok(steps.finish(snapshot))
    }

    pub async fn arrive(&self, booking_id: &str) -> EntityResult<Propagated<BookingSnapshot>> {
        let snapshot = self.booking(booking_id).record_arrival().await?;
        let mut steps = Steps::new(booking_id);
        steps.check(
            "calendar",
            self.calendar(snapshot.date())
                .update_reference(booking_id, status_update(BookingStatus::Arrived))
                .await,
        );
        steps.check("no_show", self.no_show().unregister_booking(booking_id).await);
        Ok(steps.finish(snapshot))
    }

    /// Table choice: explicit, else the assigned one, else the best single
    /// table the optimizer recommends
    ///
    /// The table is seated first and acts as the guard: an occupied table or
    /// one held for another booking fails the call before the booking moves.
    pub async fn seat(
        &self,
        booking_id: &str,
        table_id: Option<String>,
    ) -> EntityResult<Propagated<BookingSnapshot>> {
        let booking = self.booking(booking_id);
        let current = booking.get_state().await?;
        if !matches!(
            current.status,
            BookingStatus::Requested | BookingStatus::Confirmed | BookingStatus::Arrived
        ) {
            return Err(EntityError::invalid_transition(format!(
                "cannot seat a booking that is {:?}",
                current.status
            )));
        }
        let table_id = match table_id.or(current.table_id.clone()) {
            Some(id) => id,
            None => self.pick_table(&current).await?,
        };
        let table = self.table(&table_id);
        let number = table
            .seat(Some(booking_id.to_string()), current.party_size)
            .await?
            .number;

        let snapshot = match booking
            .seat(SeatGuest {
                table_id: Some(table_id.clone()),
                table_number: Some(number.clone()),
            })
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Booking changed underneath; hand the table back for bussing
                if let Err(undo) = table.clear().await {
                    tracing::warn!(booking_id = %booking_id, table_id = %table_id, error = %undo, "Table rollback failed");
                }
                return Err(e);
            }
        };
        let mut steps = Steps::new(booking_id);
        let update = ReferenceUpdate {
            status: Some(BookingStatus::Seated),
            table: Some(Some((table_id, number))),
            ..Default::default()
        };
        steps.check(
            "calendar",
            self.calendar(snapshot.date()).update_reference(booking_id, update).await,
        );
        steps.check("no_show", self.no_show().unregister_booking(booking_id).await);
        Ok(steps.finish(snapshot))
    }

    async fn pick_table(&self, booking: &BookingSnapshot) -> EntityResult<String> {
        let optimizer = OptimizerHandle::new(&self.runtime, &self.org, &self.site);
        let result = optimizer
            .recommend(AssignmentRequest {
                party_size: booking.party_size,
                time: Some(booking.time.time()),
                duration_minutes: booking.duration_minutes,
                is_vip: booking.guest.is_vip,
                ..Default::default()
            })
            .await?;
        result
            .recommendations
            .into_iter()
            .find(|r| !r.is_combination)
            .and_then(|r| r.table_ids.into_iter().next())
            .ok_or_else(|| EntityError::validation("no single table fits the party"))
    }

    /// Frees the table (to be cleaned) and closes the visit
    pub async fn depart(&self, booking_id: &str) -> EntityResult<Propagated<BookingSnapshot>> {
        let snapshot = self.booking(booking_id).record_departure().await?;
        let mut steps = Steps::new(booking_id);
        if let Some(table_id) = snapshot.table_id.as_deref() {
            steps.check("table", self.table(table_id).clear().await);
        }
        steps.check(
            "calendar",
            self.calendar(snapshot.date())
                .update_reference(booking_id, status_update(BookingStatus::Completed))
                .await,
        );
        self.record_visit(&snapshot, VisitOutcome::Completed).await;
        Ok(steps.finish(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::{Booking, NoShowDetector};
    use crate::calendar::{BookingCalendar, BookingSettingsEntity};
    use crate::floor::{Table, TableOptimizer};
    use crate::runtime::{ManualClock, RedbStore};
    use chrono::NaiveTime;
    use shared::booking::BookingSettings;
    use shared::floor::TableCreate;
    use std::sync::Arc;

    fn runtime() -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        // Morning of the service day, so no-show reminders stay in the future
        let clock = Arc::new(ManualClock::at_local(at(8, 0), chrono_tz::Europe::Madrid));
        Runtime::builder(store)
            .clock(clock)
            .register::<Booking>()
            .register::<BookingCalendar>()
            .register::<BookingSettingsEntity>()
            .register::<NoShowDetector>()
            .register::<Table>()
            .register::<TableOptimizer>()
            .build()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn guest(party_size: u32, time: NaiveDateTime) -> NewBooking {
        NewBooking {
            guest: GuestInfo {
                name: "Ana".into(),
                ..Default::default()
            },
            party_size,
            time,
            duration_minutes: None,
            source: BookingSource::Phone,
            special_requests: None,
            seating_preference: None,
        }
    }

    #[tokio::test]
    async fn test_create_without_optional_entities() {
        let rt = runtime();
        let service = ReservationService::new(rt.clone(), "acme", "s1");
        SettingsHandle::new(&rt, "acme", "s1").initialize(None).await.unwrap();

        let created = service.create_booking(guest(2, at(19, 0))).await.unwrap();
        assert!(created.is_complete(), "{:?}", created.failures);
        assert_eq!(created.value.status, BookingStatus::Requested);

        let day = CalendarHandle::new(&rt, "acme", "s1", at(19, 0).date())
            .get()
            .await
            .unwrap();
        assert_eq!(day.references.len(), 1);
        assert_eq!(rt.scheduler().reminder_count(), 1);
    }

    #[tokio::test]
    async fn test_settings_required() {
        let rt = runtime();
        let service = ReservationService::new(rt, "acme", "s1");
        assert!(matches!(
            service.create_booking(guest(2, at(19, 0))).await,
            Err(EntityError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_outside_hours_rejected() {
        let rt = runtime();
        let service = ReservationService::new(rt.clone(), "acme", "s1");
        SettingsHandle::new(&rt, "acme", "s1").initialize(None).await.unwrap();
        assert!(matches!(
            service.create_booking(guest(2, at(4, 0))).await,
            Err(EntityError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_seat_picks_a_table_and_depart_clears_it() {
        let rt = runtime();
        let service = ReservationService::new(rt.clone(), "acme", "s1");
        SettingsHandle::new(&rt, "acme", "s1").initialize(None).await.unwrap();
        OptimizerHandle::new(&rt, "acme", "s1").initialize().await.unwrap();
        TableHandle::new(&rt, "acme", "s1", "t4")
            .create(TableCreate {
                number: "4".into(),
                floor_plan_id: None,
                min_capacity: 2,
                max_capacity: 4,
                shape: Default::default(),
                tags: Vec::new(),
                combinable: false,
            })
            .await
            .unwrap();

        let created = service.create_booking(guest(3, at(20, 0))).await.unwrap();
        let id = created.value.booking_id.clone();
        service.confirm(&id).await.unwrap();
        service.arrive(&id).await.unwrap();

        let seated = service.seat(&id, None).await.unwrap();
        assert!(seated.is_complete(), "{:?}", seated.failures);
        assert_eq!(seated.value.table_id.as_deref(), Some("t4"));
        let table = TableHandle::new(&rt, "acme", "s1", "t4");
        assert_eq!(table.get_state().await.unwrap().status, TableStatus::Occupied);

        let departed = service.depart(&id).await.unwrap();
        assert_eq!(departed.value.status, BookingStatus::Completed);
        assert_eq!(table.get_state().await.unwrap().status, TableStatus::Dirty);
        let day = CalendarHandle::new(&rt, "acme", "s1", at(20, 0).date())
            .get()
            .await
            .unwrap();
        assert_eq!(day.find(&id).unwrap().status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_propagation_is_reported() {
        let rt = runtime();
        let service = ReservationService::new(rt.clone(), "acme", "s1");
        SettingsHandle::new(&rt, "acme", "s1").initialize(None).await.unwrap();
        let created = service.create_booking(guest(2, at(19, 0))).await.unwrap();
        let id = created.value.booking_id.clone();

        // Reference removed behind the service's back
        CalendarHandle::new(&rt, "acme", "s1", at(19, 0).date())
            .remove_reference(&id)
            .await
            .unwrap();

        let confirmed = service.confirm(&id).await.unwrap();
        assert_eq!(confirmed.value.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.failed_steps(), vec!["calendar"]);
    }

    #[tokio::test]
    async fn test_occupied_table_rejects_second_party() {
        let rt = runtime();
        let service = ReservationService::new(rt.clone(), "acme", "s1");
        SettingsHandle::new(&rt, "acme", "s1").initialize(None).await.unwrap();
        TableHandle::new(&rt, "acme", "s1", "t4")
            .create(TableCreate {
                number: "4".into(),
                floor_plan_id: None,
                min_capacity: 2,
                max_capacity: 4,
                shape: Default::default(),
                tags: Vec::new(),
                combinable: false,
            })
            .await
            .unwrap();

        let first = service.create_booking(guest(2, at(20, 0))).await.unwrap().value;
        let second = service.create_booking(guest(2, at(20, 0))).await.unwrap().value;
        service.arrive(&first.booking_id).await.unwrap();
        service.arrive(&second.booking_id).await.unwrap();

        service
            .seat(&first.booking_id, Some("t4".into()))
            .await
            .unwrap();
        let err = service
            .seat(&second.booking_id, Some("t4".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::InvalidStateTransition(_)), "{err:?}");

        let untouched = BookingHandle::new(&rt, EntityKey::booking("acme", "s1", &second.booking_id))
            .get_state()
            .await
            .unwrap();
        assert_eq!(untouched.status, BookingStatus::Arrived);
        assert!(untouched.table_id.is_none());
        let table = TableHandle::new(&rt, "acme", "s1", "t4").get_state().await.unwrap();
        assert_eq!(table.current_booking_id.as_deref(), Some(first.booking_id.as_str()));
    }

    #[tokio::test]
    async fn test_modify_moves_reference_between_days() {
        let rt = runtime();
        let service = ReservationService::new(rt.clone(), "acme", "s1");
        SettingsHandle::new(&rt, "acme", "s1").initialize(None).await.unwrap();
        let created = service.create_booking(guest(2, at(19, 0))).await.unwrap();
        let id = created.value.booking_id.clone();

        let next_day = at(19, 0) + chrono::Duration::days(1);
        let modified = service
            .modify(
                &id,
                ModifyBooking {
                    time: Some(next_day),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(modified.is_complete(), "{:?}", modified.failures);

        let old_day = CalendarHandle::new(&rt, "acme", "s1", at(19, 0).date());
        let new_day = CalendarHandle::new(&rt, "acme", "s1", next_day.date());
        assert!(old_day.get().await.unwrap().find(&id).is_none());
        assert!(new_day.get().await.unwrap().find(&id).is_some());
    }
}

//! Booking calendar entity (snapshot, one per site and date)
//!
//! `total_covers` is recomputed inside the same update that touches a
//! reference, so it always equals the sum of reference party sizes.

use super::availability::{self, AvailabilityInput};
use super::settings::SettingsHandle;
use crate::floor::optimizer::OptimizerHandle;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::EntityKey;
use shared::booking::{
    AvailabilityRequest, AvailabilityResult, BookingReference, CalendarSnapshot, ReferenceUpdate,
};
use shared::key::EntityKind;

pub struct BookingCalendar {
    cell: SnapshotCell<CalendarSnapshot>,
}

#[async_trait]
impl Entity for BookingCalendar {
    const KIND: EntityKind = EntityKind::BookingCalendar;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }
}

fn recount(calendar: &mut CalendarSnapshot) {
    calendar.total_covers = calendar.references.iter().map(|r| r.party_size).sum();
}

/// Keep references ordered by time, stable for equal times
fn insert_ordered(references: &mut Vec<BookingReference>, reference: BookingReference) {
    let at = references.partition_point(|r| r.time <= reference.time);
    references.insert(at, reference);
}

impl BookingCalendar {
    fn empty(ctx: &EntityContext) -> EntityResult<CalendarSnapshot> {
        let key = ctx.key();
        let date = key
            .date
            .ok_or_else(|| EntityError::Internal(format!("calendar key without date: {key}")))?;
        Ok(CalendarSnapshot {
            org: key.org.clone(),
            site: key.site.clone(),
            date,
            ..Default::default()
        })
    }

    /// First reference creates the day
    fn add_reference(
        &mut self,
        reference: BookingReference,
        ctx: &EntityContext,
    ) -> EntityResult<CalendarSnapshot> {
        if reference.booking_id.is_empty() {
            return Err(EntityError::validation("booking_id is required"));
        }
        if reference.party_size == 0 {
            return Err(EntityError::validation("party_size must be positive"));
        }
        let now = ctx.now_millis();
        if !self.cell.exists() {
            let mut day = Self::empty(ctx)?;
            day.created_at = now;
            self.cell.set(day)?;
        }
        self.cell.update(|calendar| {
            if calendar.find(&reference.booking_id).is_some() {
                return Err(EntityError::AlreadyExists(format!(
                    "booking {} on {}",
                    reference.booking_id, calendar.date
                )));
            }
            insert_ordered(&mut calendar.references, reference);
            recount(calendar);
            calendar.updated_at = now;
            Ok(calendar.clone())
        })
    }

    fn update_reference(
        &mut self,
        booking_id: &str,
        update: ReferenceUpdate,
        now: i64,
    ) -> EntityResult<CalendarSnapshot> {
        if update.party_size == Some(0) {
            return Err(EntityError::validation("party_size must be positive"));
        }
        self.cell.update(|calendar| {
            let at = calendar
                .references
                .iter()
                .position(|r| r.booking_id == booking_id)
                .ok_or_else(|| EntityError::not_found(format!("booking {booking_id}")))?;
            let mut reference = calendar.references.remove(at);
            if let Some(v) = update.time {
                reference.time = v;
            }
            if let Some(v) = update.party_size {
                reference.party_size = v;
            }
            if let Some(v) = update.status {
                reference.status = v;
            }
            if let Some(v) = update.guest_name {
                reference.guest_name = v;
            }
            if let Some(table) = update.table {
                (reference.table_id, reference.table_number) = match table {
                    Some((id, number)) => (Some(id), Some(number)),
                    None => (None, None),
                };
            }
            if let Some(v) = update.duration_minutes {
                reference.duration_minutes = Some(v);
            }
            insert_ordered(&mut calendar.references, reference);
            recount(calendar);
            calendar.updated_at = now;
            Ok(calendar.clone())
        })
    }

    fn remove_reference(&mut self, booking_id: &str, now: i64) -> EntityResult<CalendarSnapshot> {
        self.cell.update(|calendar| {
            let before = calendar.references.len();
            calendar.references.retain(|r| r.booking_id != booking_id);
            if calendar.references.len() == before {
                return Err(EntityError::not_found(format!("booking {booking_id}")));
            }
            recount(calendar);
            calendar.updated_at = now;
            Ok(calendar.clone())
        })
    }

    /// Reads settings (required) and the site optimizer (optional)
    async fn check_availability(
        &self,
        request: AvailabilityRequest,
        ctx: &EntityContext,
    ) -> EntityResult<AvailabilityResult> {
        if request.party_size == 0 {
            return Err(EntityError::validation("party_size must be positive"));
        }
        let key = ctx.key();
        let settings = SettingsHandle::new(ctx.runtime(), &key.org, &key.site)
            .get()
            .await?;

        let optimizer = match OptimizerHandle::new(ctx.runtime(), &key.org, &key.site)
            .get_state()
            .await
        {
            Ok(state) => Some(state),
            Err(EntityError::NotInitialized(_)) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Optimizer unavailable, skipping table rule");
                None
            }
        };

        let empty;
        let calendar = match self.cell.peek() {
            Some(calendar) => calendar,
            None => {
                empty = Self::empty(ctx)?;
                &empty
            }
        };
        let now = request.now.unwrap_or_else(|| ctx.local_now());
        let result = availability::compute(&AvailabilityInput {
            settings: &settings,
            calendar,
            optimizer: optimizer.as_ref(),
            request: &request,
            now,
        });
        tracing::debug!(
            key = %key,
            party_size = request.party_size,
            available = result.available_times().len(),
            "Availability computed"
        );
        Ok(result)
    }
}

#[derive(Clone)]
pub struct CalendarHandle {
    inner: EntityRef<BookingCalendar>,
}

impl CalendarHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, date: NaiveDate) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::booking_calendar(org, site, date)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    pub async fn add_reference(&self, reference: BookingReference) -> EntityResult<CalendarSnapshot> {
        self.inner
            .call(move |c, ctx| Box::pin(async move { c.add_reference(reference, ctx) }))
            .await
    }

    pub async fn update_reference(
        &self,
        booking_id: &str,
        update: ReferenceUpdate,
    ) -> EntityResult<CalendarSnapshot> {
        let booking_id = booking_id.to_string();
        self.inner
            .call(move |c, ctx| {
                Box::pin(async move { c.update_reference(&booking_id, update, ctx.now_millis()) })
            })
            .await
    }

    pub async fn remove_reference(&self, booking_id: &str) -> EntityResult<CalendarSnapshot> {
        let booking_id = booking_id.to_string();
        self.inner
            .call(move |c, ctx| {
                Box::pin(async move { c.remove_reference(&booking_id, ctx.now_millis()) })
            })
            .await
    }

    pub async fn check_availability(
        &self,
        request: AvailabilityRequest,
    ) -> EntityResult<AvailabilityResult> {
        self.inner
            .call(move |c, ctx| Box::pin(async move { c.check_availability(request, ctx).await }))
            .await
    }

    pub async fn get(&self) -> EntityResult<CalendarSnapshot> {
        self.inner
            .call(|c, _| Box::pin(async move { c.cell.get().cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|c, _| Box::pin(async move { Ok::<_, EntityError>(c.cell.exists()) }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::settings::BookingSettingsEntity;
    use crate::floor::optimizer::TableOptimizer;
    use crate::runtime::RedbStore;
    use chrono::NaiveTime;
    use shared::booking::{BookingSettings, BookingSource, BookingStatus};
    use shared::floor::OptimizableTable;
    use std::sync::Arc;

    fn runtime() -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        Runtime::builder(store)
            .register::<BookingCalendar>()
            .register::<BookingSettingsEntity>()
            .register::<TableOptimizer>()
            .build()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn reference(id: &str, time: NaiveTime, party: u32) -> BookingReference {
        BookingReference {
            booking_id: id.into(),
            confirmation_code: "ABC123".into(),
            time,
            party_size: party,
            guest_name: "guest".into(),
            status: BookingStatus::Confirmed,
            table_id: None,
            table_number: None,
            duration_minutes: None,
            source: Some(BookingSource::Phone),
        }
    }

    fn assert_covers(state: &CalendarSnapshot) {
        let sum: u32 = state.references.iter().map(|r| r.party_size).sum();
        assert_eq!(state.total_covers, sum);
    }

    #[tokio::test]
    async fn test_covers_track_every_mutation() {
        let rt = runtime();
        let cal = CalendarHandle::new(&rt, "acme", "s1", date());
        assert!(!cal.exists().await.unwrap());

        let s = cal.add_reference(reference("a", t(19, 0), 4)).await.unwrap();
        assert_covers(&s);
        let s = cal.add_reference(reference("b", t(18, 0), 2)).await.unwrap();
        assert_covers(&s);
        assert_eq!(s.references[0].booking_id, "b");

        assert!(matches!(
            cal.add_reference(reference("a", t(20, 0), 6)).await,
            Err(EntityError::AlreadyExists(_))
        ));
        assert!(cal.add_reference(reference("z", t(20, 0), 0)).await.is_err());

        let s = cal
            .update_reference(
                "b",
                ReferenceUpdate {
                    party_size: Some(5),
                    time: Some(t(20, 0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_covers(&s);
        assert_eq!(s.total_covers, 9);
        assert_eq!(s.references[1].booking_id, "b");

        let s = cal
            .update_reference(
                "a",
                ReferenceUpdate {
                    status: Some(BookingStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_covers(&s);

        let s = cal.remove_reference("a").await.unwrap();
        assert_covers(&s);
        assert_eq!(s.total_covers, 5);
        assert!(matches!(
            cal.remove_reference("a").await,
            Err(EntityError::NotFound(_))
        ));
        assert_eq!(cal.get().await.unwrap(), s);
    }

    #[tokio::test]
    async fn test_availability_reads_settings_and_optimizer() {
        let rt = runtime();
        let cal = CalendarHandle::new(&rt, "acme", "s1", date());
        let request = AvailabilityRequest {
            party_size: 2,
            ..Default::default()
        };

        // Settings are required
        assert!(matches!(
            cal.check_availability(request.clone()).await,
            Err(EntityError::NotInitialized(_))
        ));

        SettingsHandle::new(&rt, "acme", "s1")
            .initialize(Some(BookingSettings {
                max_bookings_per_slot: 3,
                ..Default::default()
            }))
            .await
            .unwrap();

        // No optimizer: degraded, no suggestions
        let result = cal.check_availability(request.clone()).await.unwrap();
        let slot = result.slot(t(12, 0)).unwrap();
        assert!(slot.available);
        assert_eq!(slot.available_capacity, 3);
        assert!(slot.suggestions.is_empty());
        // Read-only: the calendar was not created
        assert!(!cal.exists().await.unwrap());

        let optimizer = OptimizerHandle::new(&rt, "acme", "s1");
        optimizer.initialize().await.unwrap();
        optimizer
            .register_table(OptimizableTable::new("t1", "1", 1, 2))
            .await
            .unwrap();
        let result = cal.check_availability(request).await.unwrap();
        let slot = result.slot(t(12, 0)).unwrap();
        assert_eq!(slot.available_capacity, 1);
        assert_eq!(slot.suggestions.len(), 1);
    }
}

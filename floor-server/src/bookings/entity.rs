//! Booking entity (event-sourced)

use super::actions::*;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, EventRecord, Journal, Runtime,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::EntityKey;
use shared::booking::{BookingEvent, BookingSnapshot};
use shared::key::EntityKind;

pub struct Booking {
    journal: Journal<BookingSnapshot>,
}

#[async_trait]
impl Entity for Booking {
    const KIND: EntityKind = EntityKind::Booking;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            journal: Journal::load(ctx)?,
        })
    }
}

impl Booking {
    fn state(&self, ctx: &EntityContext) -> EntityResult<&BookingSnapshot> {
        let state = self.journal.state();
        if !state.is_created() {
            return Err(EntityError::not_initialized(ctx.key()));
        }
        Ok(state)
    }

    /// Validate → append → fold
    pub fn execute(
        &mut self,
        action: &dyn CommandHandler,
        ctx: &EntityContext,
    ) -> EntityResult<BookingSnapshot> {
        if !action.creates() {
            self.state(ctx)?;
        }
        let key = ctx.key();
        let metadata = CommandMetadata {
            booking_id: &key.id,
            org: &key.org,
            site: &key.site,
            now: ctx.now_millis(),
        };
        let events = action.execute(self.journal.state(), &metadata)?;
        for event in &events {
            tracing::debug!(key = %key, event = event.name(), "Booking event");
        }
        Ok(self.journal.raise(events, metadata.now)?.clone())
    }
}

/// Typed handle for one booking
#[derive(Clone)]
pub struct BookingHandle {
    inner: EntityRef<Booking>,
}

impl BookingHandle {
    pub fn new(runtime: &Runtime, key: EntityKey) -> Self {
        Self {
            inner: EntityRef::new(runtime, key),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    async fn execute<A>(&self, action: A) -> EntityResult<BookingSnapshot>
    where
        A: CommandHandler + Send + 'static,
    {
        self.inner
            .call(move |booking, ctx| Box::pin(async move { booking.execute(&action, ctx) }))
            .await
    }

    pub async fn request(&self, cmd: RequestBooking) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn confirm(&self) -> EntityResult<BookingSnapshot> {
        self.execute(ConfirmBooking).await
    }

    pub async fn modify(&self, cmd: ModifyBooking) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn cancel(&self, cmd: CancelBooking) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn assign_table(&self, cmd: AssignTable) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn record_arrival(&self) -> EntityResult<BookingSnapshot> {
        self.execute(RecordArrival).await
    }

    pub async fn seat(&self, cmd: SeatGuest) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn record_departure(&self) -> EntityResult<BookingSnapshot> {
        self.execute(RecordDeparture).await
    }

    pub async fn mark_no_show(&self) -> EntityResult<BookingSnapshot> {
        self.execute(MarkNoShow).await
    }

    pub async fn add_note(&self, cmd: AddNote) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn require_deposit(&self, amount: Decimal) -> EntityResult<BookingSnapshot> {
        self.execute(RequireDeposit { amount }).await
    }

    pub async fn pay_deposit(&self, cmd: PayDeposit) -> EntityResult<BookingSnapshot> {
        self.execute(cmd).await
    }

    pub async fn forfeit_deposit(&self) -> EntityResult<BookingSnapshot> {
        self.execute(ForfeitDeposit).await
    }

    pub async fn refund_deposit(&self) -> EntityResult<BookingSnapshot> {
        self.execute(RefundDeposit).await
    }

    pub async fn get_state(&self) -> EntityResult<BookingSnapshot> {
        self.inner
            .call(|booking, ctx| Box::pin(async move { booking.state(ctx).cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|booking, _| {
                Box::pin(async move { Ok::<_, EntityError>(booking.journal.state().is_created()) })
            })
            .await
    }

    pub async fn version(&self) -> EntityResult<u64> {
        self.inner
            .call(|booking, _| Box::pin(async move { Ok::<_, EntityError>(booking.journal.version()) }))
            .await
    }

    /// Stored events in append order
    pub async fn history(&self) -> EntityResult<Vec<EventRecord<BookingEvent>>> {
        self.inner
            .call(|booking, ctx| {
                Box::pin(async move {
                    booking.state(ctx)?;
                    booking.journal.history()
                })
            })
            .await
    }

    /// State as it was after `version` events
    pub async fn state_at(&self, version: u64) -> EntityResult<BookingSnapshot> {
        self.inner
            .call(move |booking, ctx| {
                Box::pin(async move {
                    booking.state(ctx)?;
                    booking.journal.state_at(version)
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RedbStore;
    use chrono::NaiveDate;
    use shared::booking::{BookingSource, BookingStatus, GuestInfo};
    use std::sync::Arc;

    fn request(party_size: u32) -> RequestBooking {
        RequestBooking {
            guest: GuestInfo {
                name: "Ana".into(),
                ..Default::default()
            },
            party_size,
            time: NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            duration_minutes: None,
            source: BookingSource::Phone,
            special_requests: None,
            confirmation_code: None,
        }
    }

    fn runtime(store: Arc<RedbStore>) -> Runtime {
        Runtime::builder(store).register::<Booking>().build()
    }

    #[tokio::test]
    async fn test_guard_before_creation() {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        let rt = runtime(store);
        let booking = BookingHandle::new(&rt, EntityKey::booking("acme", "s1", "b-1"));

        assert!(!booking.exists().await.unwrap());
        assert!(matches!(
            booking.confirm().await,
            Err(EntityError::NotInitialized(_))
        ));
        assert!(matches!(
            booking.get_state().await,
            Err(EntityError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_survives_restart() {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        let key = EntityKey::booking("acme", "s1", "b-1");
        {
            let rt = runtime(store.clone());
            let booking = BookingHandle::new(&rt, key.clone());
            let created = booking.request(request(4)).await.unwrap();
            assert_eq!(created.booking_id, "b-1");
            assert_eq!(created.site, "s1");
            assert_eq!(created.confirmation_code.len(), 6);
            booking.confirm().await.unwrap();
            booking
                .add_note(AddNote {
                    text: "allergy: nuts".into(),
                    author: Some("host".into()),
                })
                .await
                .unwrap();
            rt.shutdown();
        }

        let rt = runtime(store);
        let booking = BookingHandle::new(&rt, key);
        let state = booking.get_state().await.unwrap();
        assert_eq!(state.status, BookingStatus::Confirmed);
        assert_eq!(state.notes.len(), 1);
        assert_eq!(state.version, 3);
        assert_eq!(booking.version().await.unwrap(), 3);

        let at_one = booking.state_at(1).await.unwrap();
        assert_eq!(at_one.status, BookingStatus::Requested);
        assert!(at_one.notes.is_empty());

        let history = booking.history().await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].version, 2);
    }

    #[tokio::test]
    async fn test_rejected_command_raises_nothing() {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        let rt = runtime(store);
        let booking = BookingHandle::new(&rt, EntityKey::booking("acme", "s1", "b-1"));
        booking.request(request(2)).await.unwrap();

        assert!(booking.record_departure().await.is_err());
        assert_eq!(booking.version().await.unwrap(), 1);
        assert_eq!(booking.history().await.unwrap().len(), 1);
    }
}

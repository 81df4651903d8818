//! No-show detector (snapshot, one per site)
//!
//! `register_booking` arms a durable reminder at `booking time + grace`.
//! When it fires (or on a manual `check_booking`) the booking is re-read;
//! a booking still awaiting arrival at or past the deadline is marked
//! no-show. Deposit forfeiture, the calendar status, the guest
//! notification and guest history are best effort.

use super::entity::BookingHandle;
use crate::calendar::CalendarHandle;
use crate::core::config::NoShowConfig;
use crate::runtime::clock::local_to_millis;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use crate::services::collaborators::{
    GuestHistory, Notification, NotificationKind, Notifier, VisitOutcome,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shared::EntityKey;
use shared::booking::{BookingSnapshot, BookingStatus, DepositStatus, ReferenceUpdate};
use shared::key::EntityKind;
use std::collections::VecDeque;

const REMINDER_PREFIX: &str = "no-show:";

fn reminder_name(booking_id: &str) -> String {
    format!("{REMINDER_PREFIX}{booking_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedBooking {
    pub booking_id: String,
    pub time: NaiveDateTime,
    /// Unix millis of `time + grace`
    pub due_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoShowRecord {
    pub booking_id: String,
    pub guest_name: String,
    pub party_size: u32,
    pub booking_time: NaiveDateTime,
    pub detected_at: i64,
    pub deposit_forfeited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NoShowSnapshot {
    pub watched: Vec<WatchedBooking>,
    /// Most recent last, capped at `history_limit`
    pub history: VecDeque<NoShowRecord>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoShowOutcome {
    /// Marked no-show just now
    NoShow(NoShowRecord),
    /// Grace period still running
    NotYet { due_at: i64 },
    /// Booking already moved on (arrived, cancelled, ...)
    NotApplicable(BookingStatus),
}

pub struct NoShowDetector {
    cell: SnapshotCell<NoShowSnapshot>,
}

#[async_trait]
impl Entity for NoShowDetector {
    const KIND: EntityKind = EntityKind::NoShowDetector;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }

    async fn receive_reminder(&mut self, name: &str, ctx: &EntityContext) -> EntityResult<()> {
        let Some(booking_id) = name.strip_prefix(REMINDER_PREFIX) else {
            tracing::warn!(key = %ctx.key(), reminder = name, "Unknown reminder");
            return Ok(());
        };
        ctx.unregister_reminder(name)?;
        match self.check(booking_id, ctx).await {
            Ok(outcome) => {
                tracing::debug!(key = %ctx.key(), booking_id, ?outcome, "No-show check fired");
                Ok(())
            }
            Err(EntityError::NotInitialized(_)) => {
                self.unwatch(booking_id, ctx.now_millis())?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn config(ctx: &EntityContext) -> NoShowConfig {
    ctx.data::<NoShowConfig>()
        .map(|c| c.as_ref().clone())
        .unwrap_or_default()
}

impl NoShowDetector {
    fn ensure(&mut self, now: i64) -> EntityResult<()> {
        if !self.cell.exists() {
            self.cell.set(NoShowSnapshot {
                updated_at: now,
                ..Default::default()
            })?;
        }
        Ok(())
    }

    fn register(&mut self, booking_id: String, time: NaiveDateTime, ctx: &EntityContext) -> EntityResult<WatchedBooking> {
        let now = ctx.now_millis();
        self.ensure(now)?;
        let grace = config(ctx).grace_period.as_millis() as i64;
        let watched = WatchedBooking {
            due_at: local_to_millis(time, ctx.timezone()) + grace,
            booking_id,
            time,
        };
        ctx.register_reminder(&reminder_name(&watched.booking_id), watched.due_at, None)?;
        self.cell.update(|s| {
            s.watched.retain(|w| w.booking_id != watched.booking_id);
            s.watched.push(watched.clone());
            s.updated_at = now;
            Ok(())
        })?;
        tracing::debug!(key = %ctx.key(), booking_id = %watched.booking_id, due_at = watched.due_at, "No-show check armed");
        Ok(watched)
    }

    fn unregister(&mut self, booking_id: &str, ctx: &EntityContext) -> EntityResult<()> {
        ctx.unregister_reminder(&reminder_name(booking_id))?;
        self.unwatch(booking_id, ctx.now_millis())
    }

    fn unwatch(&mut self, booking_id: &str, now: i64) -> EntityResult<()> {
        let watching = self
            .cell
            .peek()
            .is_some_and(|s| s.watched.iter().any(|w| w.booking_id == booking_id));
        if !watching {
            return Ok(());
        }
        self.cell.update(|s| {
            s.watched.retain(|w| w.booking_id != booking_id);
            s.updated_at = now;
            Ok(())
        })
    }

    /// Evaluate one booking against its grace deadline
    async fn check(&mut self, booking_id: &str, ctx: &EntityContext) -> EntityResult<NoShowOutcome> {
        let key = ctx.key();
        let now = ctx.now_millis();
        let cfg = config(ctx);
        let booking = BookingHandle::new(ctx.runtime(), EntityKey::booking(&key.org, &key.site, booking_id));
        let state = booking.get_state().await?;

        if !state.status.is_awaiting_arrival() {
            self.unwatch(booking_id, now)?;
            return Ok(NoShowOutcome::NotApplicable(state.status));
        }
        let due_at = local_to_millis(state.time, ctx.timezone()) + cfg.grace_period.as_millis() as i64;
        if now < due_at {
            return Ok(NoShowOutcome::NotYet { due_at });
        }

        let state = booking.mark_no_show().await?;
        tracing::info!(key = %key, booking_id, party_size = state.party_size, "Booking marked no-show");

        let deposit_forfeited = cfg.forfeit_deposit && self.forfeit(&booking, &state).await;
        let record = NoShowRecord {
            booking_id: booking_id.to_string(),
            guest_name: state.guest.name.clone(),
            party_size: state.party_size,
            booking_time: state.time,
            detected_at: now,
            deposit_forfeited,
        };
        self.ensure(now)?;
        self.cell.update(|s| {
            s.watched.retain(|w| w.booking_id != booking_id);
            s.history.push_back(record.clone());
            while s.history.len() > cfg.history_limit {
                s.history.pop_front();
            }
            s.updated_at = now;
            Ok(())
        })?;

        propagate(ctx, &state).await;
        Ok(NoShowOutcome::NoShow(record))
    }

    async fn forfeit(&self, booking: &BookingHandle, state: &BookingSnapshot) -> bool {
        if !state
            .deposit
            .as_ref()
            .is_some_and(|d| d.status == DepositStatus::Paid)
        {
            return false;
        }
        match booking.forfeit_deposit().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(booking_id = %state.booking_id, error = %e, "Deposit forfeiture failed");
                false
            }
        }
    }
}

/// Calendar status, notification and guest history
async fn propagate(ctx: &EntityContext, state: &BookingSnapshot) {
    let calendar = CalendarHandle::new(ctx.runtime(), &state.org, &state.site, state.date());
    let update = ReferenceUpdate {
        status: Some(BookingStatus::NoShow),
        ..Default::default()
    };
    if let Err(e) = calendar.update_reference(&state.booking_id, update).await {
        tracing::warn!(booking_id = %state.booking_id, error = %e, "Calendar no-show update failed");
    }

    if let Some(notifier) = ctx.data::<dyn Notifier>() {
        let notification = Notification {
            kind: NotificationKind::BookingNoShow,
            subject_id: state.booking_id.clone(),
            site: state.site.clone(),
            guest_name: state.guest.name.clone(),
            phone: state.guest.phone.clone(),
            email: state.guest.email.clone(),
            message: format!("Booking {} was marked as a no-show", state.confirmation_code),
        };
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(booking_id = %state.booking_id, error = %e, "No-show notification failed");
        }
    }

    if let Some(history) = ctx.data::<dyn GuestHistory>()
        && let Err(e) = history
            .record(
                &state.org,
                &state.guest,
                &state.booking_id,
                state.party_size,
                VisitOutcome::NoShow,
            )
            .await
    {
        tracing::warn!(booking_id = %state.booking_id, error = %e, "Guest history update failed");
    }
}

#[derive(Clone)]
pub struct NoShowHandle {
    inner: EntityRef<NoShowDetector>,
}

impl NoShowHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::no_show_detector(org, site)),
        }
    }

    /// Arm (or re-arm) the check for a booking at its venue-local time
    pub async fn register_booking(
        &self,
        booking_id: &str,
        time: NaiveDateTime,
    ) -> EntityResult<WatchedBooking> {
        let booking_id = booking_id.to_string();
        self.inner
            .call(move |d, ctx| Box::pin(async move { d.register(booking_id, time, ctx) }))
            .await
    }

    pub async fn unregister_booking(&self, booking_id: &str) -> EntityResult<()> {
        let booking_id = booking_id.to_string();
        self.inner
            .call(move |d, ctx| Box::pin(async move { d.unregister(&booking_id, ctx) }))
            .await
    }

    /// Same evaluation the reminder performs
    pub async fn check_booking(&self, booking_id: &str) -> EntityResult<NoShowOutcome> {
        let booking_id = booking_id.to_string();
        self.inner
            .call(move |d, ctx| Box::pin(async move { d.check(&booking_id, ctx).await }))
            .await
    }

    pub async fn get_state(&self) -> EntityResult<NoShowSnapshot> {
        self.inner
            .call(|d, _| Box::pin(async move { d.cell.get().cloned() }))
            .await
    }

    pub async fn history(&self) -> EntityResult<Vec<NoShowRecord>> {
        self.inner
            .call(|d, _| {
                Box::pin(async move {
                    Ok::<_, EntityError>(
                        d.cell
                            .peek()
                            .map(|s| s.history.iter().cloned().collect())
                            .unwrap_or_default(),
                    )
                })
            })
            .await
    }
}

//! Reminder and timer scheduling
//!
//! | | Reminder | Timer |
//! |---|---|---|
//! | Persisted | yes (`ReminderStore`) | no |
//! | Survives eviction / restart | yes, re-activates the entity | no, dies with the activation |
//! | Delivered via | `Entity::receive_reminder` | `Entity::receive_timer` |
//!
//! Both are tokio tasks that sleep until due and then push a job into the
//! owning entity's mailbox, so firings are serialized with commands.
//!
//! Every registration carries a sequence number. A task only touches the
//! persisted record or the schedule map while its sequence is still the
//! current one, so a re-registration during a firing is never clobbered.

use super::error::EntityResult;
use super::host::{Firing, Runtime};
use super::store::ReminderRecord;
use parking_lot::Mutex;
use shared::EntityKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;

type ScheduleKey = (String, String);

struct Scheduled {
    seq: u64,
    handle: AbortHandle,
}

struct ScheduledTimer {
    seq: u64,
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    next_seq: AtomicU64,
    reminders: Mutex<HashMap<ScheduleKey, Scheduled>>,
    timers: Mutex<HashMap<ScheduleKey, ScheduledTimer>>,
}

impl Scheduler {
    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ========== Reminders ==========

    /// Persist (optionally) and arm a reminder, replacing any with the same name
    pub(crate) fn schedule_reminder(
        &self,
        runtime: &Runtime,
        record: ReminderRecord,
        persist: bool,
    ) -> EntityResult<()> {
        let seq = self.next_seq();
        let mut reminders = self.reminders.lock();
        if persist {
            runtime.store().upsert_reminder(&record)?;
        }
        let schedule_key = (record.entity_key.clone(), record.name.clone());
        tracing::debug!(
            key = %record.entity_key,
            reminder = %record.name,
            due_at = record.due_at,
            "Reminder scheduled"
        );
        let handle = tokio::spawn(reminder_loop(runtime.clone(), record, seq)).abort_handle();
        if let Some(old) = reminders.insert(schedule_key, Scheduled { seq, handle }) {
            old.handle.abort();
        }
        Ok(())
    }

    pub(crate) fn cancel_reminder(
        &self,
        runtime: &Runtime,
        entity_key: &str,
        name: &str,
    ) -> EntityResult<()> {
        let mut reminders = self.reminders.lock();
        if let Some(old) = reminders.remove(&(entity_key.to_string(), name.to_string())) {
            old.handle.abort();
        }
        runtime.store().delete_reminder(entity_key, name)?;
        Ok(())
    }

    /// One-shot reminder delivered: drop it if nobody re-registered meanwhile
    fn finish_reminder(&self, runtime: &Runtime, record: &ReminderRecord, seq: u64) {
        let mut reminders = self.reminders.lock();
        let schedule_key = (record.entity_key.clone(), record.name.clone());
        if reminders.get(&schedule_key).is_some_and(|s| s.seq == seq) {
            reminders.remove(&schedule_key);
            if let Err(e) = runtime
                .store()
                .delete_reminder(&record.entity_key, &record.name)
            {
                tracing::warn!(key = %record.entity_key, reminder = %record.name, error = %e, "Failed to delete fired reminder");
            }
        }
    }

    /// Periodic reminder advanced: persist the next due time if still current
    fn advance_reminder(&self, runtime: &Runtime, record: &ReminderRecord, seq: u64) -> bool {
        let reminders = self.reminders.lock();
        let schedule_key = (record.entity_key.clone(), record.name.clone());
        if !reminders.get(&schedule_key).is_some_and(|s| s.seq == seq) {
            return false;
        }
        if let Err(e) = runtime.store().upsert_reminder(record) {
            tracing::warn!(key = %record.entity_key, reminder = %record.name, error = %e, "Failed to persist reminder");
        }
        true
    }

    pub(crate) fn reminder_count(&self) -> usize {
        self.reminders.lock().len()
    }

    // ========== Timers ==========

    pub(crate) fn schedule_timer(
        &self,
        runtime: &Runtime,
        key: &EntityKey,
        generation: u64,
        name: &str,
        after: Duration,
        period: Option<Duration>,
    ) {
        let seq = self.next_seq();
        let mut timers = self.timers.lock();
        let handle = tokio::spawn(timer_loop(
            runtime.clone(),
            key.clone(),
            name.to_string(),
            generation,
            after,
            period,
            seq,
        ))
        .abort_handle();
        let timer = ScheduledTimer {
            seq,
            generation,
            handle,
        };
        if let Some(old) = timers.insert((key.to_string(), name.to_string()), timer) {
            old.handle.abort();
        }
    }

    pub(crate) fn cancel_timer(&self, key_str: &str, name: &str) {
        if let Some(old) = self
            .timers
            .lock()
            .remove(&(key_str.to_string(), name.to_string()))
        {
            old.handle.abort();
        }
    }

    /// Abort every timer owned by one activation
    pub(crate) fn cancel_timers(&self, key_str: &str, generation: u64) {
        self.timers.lock().retain(|(key, _), timer| {
            if key == key_str && timer.generation == generation {
                timer.handle.abort();
                false
            } else {
                true
            }
        });
    }

    fn finish_timer(&self, key_str: &str, name: &str, seq: u64) {
        let mut timers = self.timers.lock();
        let schedule_key = (key_str.to_string(), name.to_string());
        if timers.get(&schedule_key).is_some_and(|t| t.seq == seq) {
            timers.remove(&schedule_key);
        }
    }

    pub(crate) fn timer_count(&self) -> usize {
        self.timers.lock().len()
    }
}

/// Next due time strictly after `now`, on the reminder's period grid
fn next_due(due_at: i64, period_ms: i64, now: i64) -> i64 {
    let next = due_at + period_ms;
    if next > now {
        return next;
    }
    let missed = (now - next) / period_ms + 1;
    next + missed * period_ms
}

async fn reminder_loop(runtime: Runtime, mut record: ReminderRecord, seq: u64) {
    let shutdown = runtime.shutdown_token();
    loop {
        let delay = (record.due_at - runtime.clock().now_millis()).max(0) as u64;
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }

        tracing::debug!(key = %record.entity_key, reminder = %record.name, "Reminder firing");
        if let Err(e) = runtime.fire_reminder(&record).await {
            tracing::warn!(key = %record.entity_key, reminder = %record.name, error = %e, "Reminder delivery failed");
        }

        match record.period_ms.filter(|p| *p > 0) {
            Some(period) => {
                record.due_at = next_due(record.due_at, period, runtime.clock().now_millis());
                if !runtime.scheduler().advance_reminder(&runtime, &record, seq) {
                    return;
                }
            }
            None => {
                runtime.scheduler().finish_reminder(&runtime, &record, seq);
                return;
            }
        }
    }
}

async fn timer_loop(
    runtime: Runtime,
    key: EntityKey,
    name: String,
    generation: u64,
    after: Duration,
    period: Option<Duration>,
    seq: u64,
) {
    let shutdown = runtime.shutdown_token();
    let key_str = key.to_string();
    let mut delay = after;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let firing = Firing::Timer {
            name: name.clone(),
            generation,
        };
        if let Err(e) = runtime.fire(key.clone(), firing).await {
            tracing::warn!(key = %key_str, timer = %name, error = %e, "Timer delivery failed");
        }

        match period {
            Some(period) if !period.is_zero() => delay = period,
            _ => {
                runtime.scheduler().finish_timer(&key_str, &name, seq);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_due_skips_missed_periods() {
        assert_eq!(next_due(1_000, 100, 500), 1_100);
        assert_eq!(next_due(1_000, 100, 1_100), 1_200);
        assert_eq!(next_due(1_000, 100, 1_350), 1_400);
    }
}

//! Walk-in waitlist (snapshot, one per site and date)

use crate::core::config::WaitlistConfig;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use crate::services::collaborators::{Notification, NotificationKind, Notifier};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::EntityKey;
use shared::floor::{WaitlistAdd, WaitlistEntry, WaitlistSnapshot, WaitlistStatus};
use shared::key::EntityKind;
use shared::util::new_id;

pub struct Waitlist {
    cell: SnapshotCell<WaitlistSnapshot>,
}

#[async_trait]
impl Entity for Waitlist {
    const KIND: EntityKind = EntityKind::Waitlist;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }
}

impl Waitlist {
    /// First add creates the list for the day
    fn add(&mut self, input: WaitlistAdd, ctx: &EntityContext) -> EntityResult<WaitlistEntry> {
        let guest_name = input.guest_name.trim().to_string();
        if guest_name.is_empty() {
            return Err(EntityError::validation("guest name is required"));
        }
        if input.party_size == 0 {
            return Err(EntityError::validation("party_size must be positive"));
        }
        let now = ctx.now_millis();
        if !self.cell.exists() {
            let date = ctx
                .key()
                .date
                .ok_or_else(|| EntityError::Internal("waitlist key without date".into()))?;
            self.cell.set(WaitlistSnapshot {
                date,
                entries: Vec::new(),
                created_at: now,
                updated_at: now,
            })?;
        }
        let turn = ctx
            .data::<WaitlistConfig>()
            .map(|c| c.average_turn_minutes_per_party)
            .unwrap_or_else(|| WaitlistConfig::default().average_turn_minutes_per_party);

        self.cell.update(|list| {
            let ahead = list.waiting().count() as u32;
            let entry = WaitlistEntry {
                entry_id: new_id(),
                guest_name,
                phone: input.phone,
                party_size: input.party_size,
                status: WaitlistStatus::Waiting,
                quoted_wait_minutes: ahead * turn,
                seating_preference: input.seating_preference,
                added_at: now,
                notified_at: None,
                seated_at: None,
                table_id: None,
            };
            tracing::info!(
                key = %ctx.key(),
                entry_id = %entry.entry_id,
                party_size = entry.party_size,
                quoted_wait = entry.quoted_wait_minutes,
                "Waitlist entry added"
            );
            list.entries.push(entry.clone());
            list.updated_at = now;
            Ok(entry)
        })
    }

    fn transition(
        &mut self,
        entry_id: &str,
        now: i64,
        f: impl FnOnce(&mut WaitlistEntry) -> EntityResult<()>,
    ) -> EntityResult<WaitlistEntry> {
        self.cell.update(|list| {
            let entry = list
                .entries
                .iter_mut()
                .find(|e| e.entry_id == entry_id)
                .ok_or_else(|| EntityError::not_found(format!("waitlist entry {entry_id}")))?;
            if !entry.status.is_waiting() {
                return Err(EntityError::invalid_transition(format!(
                    "waitlist entry is {:?}",
                    entry.status
                )));
            }
            f(entry)?;
            let out = entry.clone();
            list.updated_at = now;
            Ok(out)
        })
    }
}

#[derive(Clone)]
pub struct WaitlistHandle {
    inner: EntityRef<Waitlist>,
}

impl WaitlistHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, date: NaiveDate) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::waitlist(org, site, date)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    /// Quoted wait = waiting parties ahead × average turn time
    pub async fn add(&self, input: WaitlistAdd) -> EntityResult<WaitlistEntry> {
        self.inner
            .call(move |list, ctx| Box::pin(async move { list.add(input, ctx) }))
            .await
    }

    /// Tell the guest their table is ready; the notification is best effort
    pub async fn notify(&self, entry_id: &str) -> EntityResult<WaitlistEntry> {
        let id = entry_id.to_string();
        let entry = self
            .inner
            .call(move |list, ctx| {
                Box::pin(async move {
                    let now = ctx.now_millis();
                    list.transition(&id, now, |e| {
                        if e.status == WaitlistStatus::Notified {
                            return Err(EntityError::invalid_transition(
                                "guest was already notified",
                            ));
                        }
                        e.status = WaitlistStatus::Notified;
                        e.notified_at = Some(now);
                        Ok(())
                    })
                })
            })
            .await?;

        if let Some(notifier) = self.inner.runtime().data::<dyn Notifier>() {
            let notification = Notification {
                kind: NotificationKind::TableReady,
                subject_id: entry.entry_id.clone(),
                site: self.key().site.clone(),
                guest_name: entry.guest_name.clone(),
                phone: entry.phone.clone(),
                email: None,
                message: format!("Your table for {} is ready", entry.party_size),
            };
            if let Err(e) = notifier.notify(notification).await {
                tracing::warn!(entry_id = %entry.entry_id, error = %e, "Waitlist notification failed");
            }
        }
        Ok(entry)
    }

    pub async fn seat(&self, entry_id: &str, table_id: Option<String>) -> EntityResult<WaitlistEntry> {
        let id = entry_id.to_string();
        self.inner
            .call(move |list, ctx| {
                Box::pin(async move {
                    let now = ctx.now_millis();
                    list.transition(&id, now, |e| {
                        e.status = WaitlistStatus::Seated;
                        e.seated_at = Some(now);
                        e.table_id = table_id;
                        Ok(())
                    })
                })
            })
            .await
    }

    pub async fn remove(&self, entry_id: &str) -> EntityResult<WaitlistEntry> {
        let id = entry_id.to_string();
        self.inner
            .call(move |list, ctx| {
                Box::pin(async move {
                    list.transition(&id, ctx.now_millis(), |e| {
                        e.status = WaitlistStatus::Removed;
                        Ok(())
                    })
                })
            })
            .await
    }

    /// Waiting and notified entries in arrival order
    pub async fn list_waiting(&self) -> EntityResult<Vec<WaitlistEntry>> {
        self.inner
            .call(|list, _| {
                Box::pin(async move {
                    let Some(state) = list.cell.peek() else {
                        return Ok::<_, EntityError>(Vec::new());
                    };
                    Ok(state.waiting().cloned().collect())
                })
            })
            .await
    }

    pub async fn get_state(&self) -> EntityResult<WaitlistSnapshot> {
        self.inner
            .call(|list, _| Box::pin(async move { list.cell.get().cloned() }))
            .await
    }
}

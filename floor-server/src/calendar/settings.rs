//! Booking settings entity (snapshot, one per site)

use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::EntityKey;
use shared::booking::{BookingSettings, BookingSettingsUpdate};
use shared::key::EntityKind;

pub struct BookingSettingsEntity {
    cell: SnapshotCell<BookingSettings>,
}

#[async_trait]
impl Entity for BookingSettingsEntity {
    const KIND: EntityKind = EntityKind::BookingSettings;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }
}

impl BookingSettingsEntity {
    fn initialize(
        &mut self,
        initial: Option<BookingSettings>,
        ctx: &EntityContext,
    ) -> EntityResult<BookingSettings> {
        if let Some(existing) = self.cell.peek() {
            return Ok(existing.clone());
        }
        let mut settings = initial.unwrap_or_default();
        settings.validate().map_err(EntityError::validation)?;
        settings.updated_at = ctx.now_millis();
        tracing::info!(key = %ctx.key(), "Booking settings initialized");
        Ok(self.cell.set(settings)?.clone())
    }

    fn update(&mut self, update: BookingSettingsUpdate, now: i64) -> EntityResult<BookingSettings> {
        self.cell.update(|settings| {
            update.apply_to(settings);
            settings.validate().map_err(EntityError::validation)?;
            settings.updated_at = now;
            Ok(settings.clone())
        })
    }
}

#[derive(Clone)]
pub struct SettingsHandle {
    inner: EntityRef<BookingSettingsEntity>,
}

impl SettingsHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::booking_settings(org, site)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    /// Idempotent; `None` starts from the built-in defaults
    pub async fn initialize(&self, initial: Option<BookingSettings>) -> EntityResult<BookingSettings> {
        self.inner
            .call(move |s, ctx| Box::pin(async move { s.initialize(initial, ctx) }))
            .await
    }

    /// Validated as a whole; a rejected update leaves the settings untouched
    pub async fn update(&self, update: BookingSettingsUpdate) -> EntityResult<BookingSettings> {
        self.inner
            .call(move |s, ctx| Box::pin(async move { s.update(update, ctx.now_millis()) }))
            .await
    }

    pub async fn block_date(&self, date: NaiveDate) -> EntityResult<BookingSettings> {
        self.inner
            .call(move |s, ctx| {
                let now = ctx.now_millis();
                Box::pin(async move {
                    s.cell.update(|settings| {
                        if !settings.blocked_dates.contains(&date) {
                            settings.blocked_dates.push(date);
                            settings.blocked_dates.sort();
                        }
                        settings.updated_at = now;
                        Ok(settings.clone())
                    })
                })
            })
            .await
    }

    pub async fn unblock_date(&self, date: NaiveDate) -> EntityResult<BookingSettings> {
        self.inner
            .call(move |s, ctx| {
                let now = ctx.now_millis();
                Box::pin(async move {
                    s.cell.update(|settings| {
                        settings.blocked_dates.retain(|d| *d != date);
                        settings.updated_at = now;
                        Ok(settings.clone())
                    })
                })
            })
            .await
    }

    pub async fn get(&self) -> EntityResult<BookingSettings> {
        self.inner
            .call(|s, _| Box::pin(async move { s.cell.get().cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|s, _| Box::pin(async move { Ok::<_, EntityError>(s.cell.exists()) }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RedbStore;
    use chrono::NaiveTime;
    use std::sync::Arc;

    fn runtime() -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        Runtime::builder(store)
            .register::<BookingSettingsEntity>()
            .build()
    }

    #[tokio::test]
    async fn test_initialize_once() {
        let rt = runtime();
        let settings = SettingsHandle::new(&rt, "acme", "s1");
        assert!(matches!(
            settings.get().await,
            Err(EntityError::NotInitialized(_))
        ));
        let first = settings.initialize(None).await.unwrap();
        let second = settings
            .initialize(Some(BookingSettings {
                max_bookings_per_slot: 99,
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert!(settings.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_state() {
        let rt = runtime();
        let settings = SettingsHandle::new(&rt, "acme", "s1");
        settings.initialize(None).await.unwrap();

        let bad = BookingSettingsUpdate {
            close_time: NaiveTime::from_hms_opt(9, 0, 0),
            ..Default::default()
        };
        assert!(matches!(
            settings.update(bad).await,
            Err(EntityError::Validation(_))
        ));
        assert_eq!(
            settings.get().await.unwrap().close_time,
            NaiveTime::from_hms_opt(22, 0, 0).unwrap()
        );

        let good = BookingSettingsUpdate {
            max_bookings_per_slot: Some(6),
            ..Default::default()
        };
        assert_eq!(settings.update(good).await.unwrap().max_bookings_per_slot, 6);
    }

    #[tokio::test]
    async fn test_block_dates() {
        let rt = runtime();
        let settings = SettingsHandle::new(&rt, "acme", "s1");
        settings.initialize(None).await.unwrap();
        let xmas = NaiveDate::from_ymd_opt(2026, 12, 25).unwrap();
        settings.block_date(xmas).await.unwrap();
        let state = settings.block_date(xmas).await.unwrap();
        assert_eq!(state.blocked_dates, vec![xmas]);
        assert!(settings.unblock_date(xmas).await.unwrap().blocked_dates.is_empty());
    }
}

//! Entity trait and per-activation context

use super::clock::Clock;
use super::error::{EntityError, EntityResult};
use super::host::Runtime;
use super::store::{DurableStore, ReminderRecord};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use futures::future::BoxFuture;
use shared::EntityKey;
use shared::key::EntityKind;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// A key-addressed unit of state hosted by the [`Runtime`]
///
/// One instance exists per key while activated; every job against it runs
/// on the actor task that owns it, one at a time.
#[async_trait]
pub trait Entity: Sized + Send + 'static {
    const KIND: EntityKind;

    /// Load state (snapshot read or event replay) before the first job runs
    async fn activate(ctx: &EntityContext) -> EntityResult<Self>;

    /// Durable reminder delivery
    async fn receive_reminder(&mut self, name: &str, ctx: &EntityContext) -> EntityResult<()> {
        tracing::warn!(key = %ctx.key(), reminder = name, "Unhandled reminder");
        Ok(())
    }

    /// Non-durable timer delivery
    async fn receive_timer(&mut self, name: &str, ctx: &EntityContext) -> EntityResult<()> {
        tracing::warn!(key = %ctx.key(), timer = name, "Unhandled timer");
        Ok(())
    }
}

/// Per-activation handle passed to every job
pub struct EntityContext {
    key: EntityKey,
    key_str: String,
    generation: u64,
    runtime: Runtime,
}

impl EntityContext {
    pub(crate) fn new(key: EntityKey, key_str: String, generation: u64, runtime: Runtime) -> Self {
        Self {
            key,
            key_str,
            generation,
            runtime,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Rendered key, also the storage key
    pub fn key_str(&self) -> &str {
        &self.key_str
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        self.runtime.store()
    }

    pub fn now_millis(&self) -> i64 {
        self.runtime.clock().now_millis()
    }

    pub fn timezone(&self) -> Tz {
        self.runtime.config().timezone
    }

    /// Venue-local wall time
    pub fn local_now(&self) -> NaiveDateTime {
        self.runtime.clock().local_now(self.timezone())
    }

    /// Registered app data (configuration, collaborators)
    pub fn data<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.runtime.data::<T>()
    }

    /// Like [`data`](Self::data) but missing data is an error
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self) -> EntityResult<Arc<T>> {
        self.data::<T>().ok_or_else(|| {
            EntityError::Internal(format!(
                "app data {} not registered",
                std::any::type_name::<T>()
            ))
        })
    }

    // ========== Reminders (durable) ==========

    /// Schedule (or replace) a durable reminder at `due_at` Unix millis
    pub fn register_reminder(
        &self,
        name: &str,
        due_at: i64,
        period: Option<Duration>,
    ) -> EntityResult<()> {
        let record = ReminderRecord {
            entity_key: self.key_str.clone(),
            name: name.to_string(),
            due_at,
            period_ms: period.map(|p| p.as_millis() as i64),
        };
        self.runtime
            .scheduler()
            .schedule_reminder(&self.runtime, record, true)
    }

    pub fn unregister_reminder(&self, name: &str) -> EntityResult<()> {
        self.runtime
            .scheduler()
            .cancel_reminder(&self.runtime, &self.key_str, name)
    }

    // ========== Timers (activation-scoped) ==========

    /// Schedule (or replace) a timer; it dies with this activation
    pub fn register_timer(&self, name: &str, after: Duration, period: Option<Duration>) {
        self.runtime.scheduler().schedule_timer(
            &self.runtime,
            &self.key,
            self.generation,
            name,
            after,
            period,
        );
    }

    pub fn unregister_timer(&self, name: &str) {
        self.runtime.scheduler().cancel_timer(&self.key_str, name);
    }
}

/// Typed reference to one entity, the building block of per-kind handles
pub struct EntityRef<E> {
    runtime: Runtime,
    key: EntityKey,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityRef<E> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            key: self.key.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityRef<E> {
    pub fn new(runtime: &Runtime, key: EntityKey) -> Self {
        Self {
            runtime: runtime.clone(),
            key,
            _entity: PhantomData,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Run a job against the entity (activating it if needed)
    pub async fn call<R, F>(&self, f: F) -> EntityResult<R>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut E, &'a EntityContext) -> BoxFuture<'a, EntityResult<R>>
            + Send
            + 'static,
    {
        self.runtime.call::<E, R, F>(&self.key, f).await
    }
}

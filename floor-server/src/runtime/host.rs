//! Entity host: key registry, mailboxes, actor loop
//!
//! ```text
//! call(key, job)
//!     │
//!     ├─ registry hit ──────────────► mailbox.send(job)
//!     │                                   │
//!     └─ miss: spawn actor ─► activate ─► loop {
//!                                          select! {
//!                                            shutdown  → stop
//!                                            job       → run to completion
//!                                            idle      → evict
//!                                          }
//!                                        }
//!                                        retire(generation) → close → drain → cancel timers → remove
//! ```
//!
//! A retiring slot stays in the registry until the old actor has drained
//! its mailbox. Callers that reach it wait for the drain and then activate
//! a fresh generation, so two generations of one key never run together.

use super::clock::{Clock, SystemClock};
use super::entity::{Entity, EntityContext};
use super::error::{EntityError, EntityResult};
use super::store::{DurableStore, ReminderRecord};
use super::timers::Scheduler;
use crate::core::config::RuntimeConfig;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use shared::EntityKey;
use shared::key::EntityKind;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Mailbox retries when racing an eviction
const MAX_SEND_ATTEMPTS: usize = 3;

/// What a job receives: the live instance, or the activation error
pub(crate) type Target<'a, E> = Result<(&'a mut E, &'a EntityContext), EntityError>;

pub(crate) type Job<E> = Box<dyn for<'a> FnOnce(Target<'a, E>) -> BoxFuture<'a, ()> + Send>;

fn job<E, F>(f: F) -> Job<E>
where
    E: Entity,
    F: for<'a> FnOnce(Target<'a, E>) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// Wrap a typed command into a job that answers on `reply`
fn command_job<E, R, F>(f: F, reply: oneshot::Sender<EntityResult<R>>) -> Job<E>
where
    E: Entity,
    R: Send + 'static,
    F: for<'a> FnOnce(&'a mut E, &'a EntityContext) -> BoxFuture<'a, EntityResult<R>>
        + Send
        + 'static,
{
    job(move |target| {
        Box::pin(async move {
            let result = match target {
                Ok((entity, ctx)) => f(entity, ctx).await,
                Err(err) => Err(err),
            };
            let _ = reply.send(result);
        })
    })
}

/// Scheduled wake-up routed through the kind registry
pub(crate) enum Firing {
    Reminder(String),
    Timer { name: String, generation: u64 },
}

type DeliverFn =
    Arc<dyn Fn(Runtime, EntityKey, Firing) -> BoxFuture<'static, EntityResult<()>> + Send + Sync>;

struct Slot {
    generation: u64,
    state: SlotState,
}

enum SlotState {
    /// `mpsc::Sender<Job<E>>` for the entity's concrete type
    Live(Box<dyn Any + Send + Sync>),
    /// Old actor still finishing accepted jobs; cancelled once it is gone
    Draining(CancellationToken),
}

impl Slot {
    fn is_live(&self) -> bool {
        matches!(self.state, SlotState::Live(_))
    }
}

/// Marks a slot as draining; dropping it removes the slot and wakes waiters
pub(crate) struct Retirement {
    runtime: Runtime,
    key_str: String,
    generation: u64,
    drained: CancellationToken,
}

impl Retirement {
    pub(crate) fn begin(runtime: &Runtime, key_str: &str, generation: u64) -> Self {
        let drained = CancellationToken::new();
        if let Some(mut slot) = runtime.inner.registry.get_mut(key_str)
            && slot.generation == generation
        {
            slot.state = SlotState::Draining(drained.clone());
        }
        Self {
            runtime: runtime.clone(),
            key_str: key_str.to_string(),
            generation,
            drained,
        }
    }
}

impl Drop for Retirement {
    fn drop(&mut self) {
        self.runtime.release(&self.key_str, self.generation);
        self.drained.cancel();
    }
}

struct RuntimeInner {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    config: RuntimeConfig,
    registry: DashMap<String, Slot>,
    next_generation: AtomicU64,
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    kinds: HashMap<EntityKind, DeliverFn>,
    scheduler: Scheduler,
    shutdown: CancellationToken,
}

/// Entity runtime handle (cheap to clone)
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Runtime builder
pub struct RuntimeBuilder {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    config: RuntimeConfig,
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    kinds: HashMap<EntityKind, DeliverFn>,
}

impl RuntimeBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Register app data, retrievable with `ctx.data::<T>()`
    ///
    /// `T` may be a trait object: `with_data::<dyn Notifier>(Arc::new(..))`.
    pub fn with_data<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.data.insert(TypeId::of::<T>(), Box::new(value));
        self
    }

    /// Make an entity kind reachable by reminders and timers
    pub fn register<E: Entity>(mut self) -> Self {
        let deliver: DeliverFn = Arc::new(
            |runtime: Runtime, key: EntityKey, firing: Firing| -> BoxFuture<'static, EntityResult<()>> {
                Box::pin(async move { runtime.deliver::<E>(key, firing).await })
            },
        );
        self.kinds.insert(E::KIND, deliver);
        self
    }

    pub fn build(self) -> Runtime {
        Runtime {
            inner: Arc::new(RuntimeInner {
                store: self.store,
                clock: self.clock,
                config: self.config,
                registry: DashMap::new(),
                next_generation: AtomicU64::new(1),
                data: self.data,
                kinds: self.kinds,
                scheduler: Scheduler::default(),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

impl Runtime {
    pub fn builder(store: Arc<dyn DurableStore>) -> RuntimeBuilder {
        RuntimeBuilder {
            store,
            clock: Arc::new(SystemClock),
            config: RuntimeConfig::default(),
            data: HashMap::new(),
            kinds: HashMap::new(),
        }
    }

    // ========== Accessors ==========

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.inner.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn data<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner
            .data
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Number of activations, draining ones included
    pub fn active_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_active(&self, key: &EntityKey) -> bool {
        self.inner.registry.contains_key(&key.to_string())
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    // ========== Dispatch ==========

    /// Run `f` against the entity at `key`, activating it on first use
    ///
    /// Jobs for one key run one at a time in acceptance order.
    pub async fn call<E, R, F>(&self, key: &EntityKey, f: F) -> EntityResult<R>
    where
        E: Entity,
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut E, &'a EntityContext) -> BoxFuture<'a, EntityResult<R>>
            + Send
            + 'static,
    {
        Self::check_kind::<E>(key)?;
        let key_str = key.to_string();
        let (tx, rx) = oneshot::channel();
        let mut pending = command_job::<E, R, F>(f, tx);

        for _ in 0..MAX_SEND_ATTEMPTS {
            let (generation, mailbox) = self.mailbox::<E>(key, &key_str).await?;
            match mailbox.send(pending).await {
                Ok(()) => return Self::await_reply(rx, &key_str).await,
                Err(mpsc::error::SendError(returned)) => {
                    // Dead actor; a retiring one would have marked its slot first
                    self.release_dead(&key_str, generation);
                    tracing::debug!(key = %key_str, generation, "Mailbox closed, retrying");
                    pending = returned;
                }
            }
        }
        Err(EntityError::Unavailable(key_str))
    }

    /// Like [`call`](Self::call) but only reaches activation `generation`
    ///
    /// Returns `Ok(None)` when that activation is gone.
    pub(crate) async fn call_active<E, R, F>(
        &self,
        key: &EntityKey,
        generation: u64,
        f: F,
    ) -> EntityResult<Option<R>>
    where
        E: Entity,
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut E, &'a EntityContext) -> BoxFuture<'a, EntityResult<R>>
            + Send
            + 'static,
    {
        let key_str = key.to_string();
        let mailbox = match self.inner.registry.get(&key_str) {
            Some(slot) if slot.generation == generation && slot.is_live() => {
                Self::downcast::<E>(&slot, &key_str)?
            }
            _ => return Ok(None),
        };
        let (tx, rx) = oneshot::channel();
        if mailbox.send(command_job::<E, R, F>(f, tx)).await.is_err() {
            return Ok(None);
        }
        Self::await_reply(rx, &key_str).await.map(Some)
    }

    fn check_kind<E: Entity>(key: &EntityKey) -> EntityResult<()> {
        key.validate()?;
        if key.kind != E::KIND {
            return Err(EntityError::Internal(format!(
                "key {} addressed as {}",
                key,
                E::KIND
            )));
        }
        Ok(())
    }

    async fn await_reply<R>(
        rx: oneshot::Receiver<EntityResult<R>>,
        key_str: &str,
    ) -> EntityResult<R> {
        rx.await.map_err(|_| {
            EntityError::Unavailable(format!("{key_str}: actor stopped before replying"))
        })?
    }

    fn downcast<E: Entity>(slot: &Slot, key_str: &str) -> EntityResult<mpsc::Sender<Job<E>>> {
        let SlotState::Live(mailbox) = &slot.state else {
            return Err(EntityError::Unavailable(format!("{key_str}: retiring")));
        };
        mailbox
            .downcast_ref::<mpsc::Sender<Job<E>>>()
            .cloned()
            .ok_or_else(|| EntityError::Internal(format!("mailbox type mismatch for {key_str}")))
    }

    /// Existing mailbox, or a freshly spawned actor once any retiring one is gone
    async fn mailbox<E: Entity>(
        &self,
        key: &EntityKey,
        key_str: &str,
    ) -> EntityResult<(u64, mpsc::Sender<Job<E>>)> {
        loop {
            if self.is_shutdown() {
                return Err(EntityError::Unavailable(format!(
                    "{key_str}: runtime shutting down"
                )));
            }
            let drained = match self.inner.registry.entry(key_str.to_string()) {
                Entry::Occupied(slot) => match &slot.get().state {
                    SlotState::Draining(drained) => drained.clone(),
                    SlotState::Live(_) => {
                        let slot = slot.get();
                        return Ok((slot.generation, Self::downcast::<E>(slot, key_str)?));
                    }
                },
                Entry::Vacant(vacant) => {
                    let (tx, rx) = mpsc::channel(self.inner.config.mailbox_capacity.max(1));
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    vacant.insert(Slot {
                        generation,
                        state: SlotState::Live(Box::new(tx.clone())),
                    });
                    let ctx = EntityContext::new(
                        key.clone(),
                        key_str.to_string(),
                        generation,
                        self.clone(),
                    );
                    tokio::spawn(run_actor::<E>(self.clone(), ctx, rx));
                    return Ok((generation, tx));
                }
            };
            tracing::trace!(key = %key_str, "Waiting for retiring activation");
            drained.cancelled().await;
        }
    }

    /// Remove the registry slot if it still belongs to `generation`
    fn release(&self, key_str: &str, generation: u64) -> bool {
        self.inner
            .registry
            .remove_if(key_str, |_, slot| slot.generation == generation)
            .is_some()
    }

    /// Like [`release`](Self::release) but leaves a draining slot alone
    fn release_dead(&self, key_str: &str, generation: u64) -> bool {
        self.inner
            .registry
            .remove_if(key_str, |_, slot| slot.generation == generation && slot.is_live())
            .is_some()
    }

    // ========== Reminders / timers ==========

    async fn deliver<E: Entity>(&self, key: EntityKey, firing: Firing) -> EntityResult<()> {
        match firing {
            Firing::Reminder(name) => {
                self.call::<E, (), _>(&key, move |entity, ctx| {
                    Box::pin(async move { entity.receive_reminder(&name, ctx).await })
                })
                .await
            }
            Firing::Timer { name, generation } => self
                .call_active::<E, (), _>(&key, generation, move |entity, ctx| {
                    Box::pin(async move { entity.receive_timer(&name, ctx).await })
                })
                .await
                .map(|_| ()),
        }
    }

    pub(crate) async fn fire(&self, key: EntityKey, firing: Firing) -> EntityResult<()> {
        let Some(deliver) = self.inner.kinds.get(&key.kind).cloned() else {
            tracing::warn!(key = %key, kind = %key.kind, "No entity kind registered for firing");
            return Ok(());
        };
        deliver(self.clone(), key, firing).await
    }

    pub(crate) async fn fire_reminder(&self, record: &ReminderRecord) -> EntityResult<()> {
        let key: EntityKey = record.entity_key.parse()?;
        self.fire(key, Firing::Reminder(record.name.clone())).await
    }

    /// Re-arm every persisted reminder; overdue ones fire immediately
    pub fn restore_reminders(&self) -> EntityResult<usize> {
        let records = self.inner.store.load_reminders()?;
        let count = records.len();
        for record in records {
            self.inner.scheduler.schedule_reminder(self, record, false)?;
        }
        tracing::info!(count, "Reminders restored");
        Ok(count)
    }

    /// Stop every actor, timer and reminder task
    ///
    /// Actors finish the jobs already in their mailbox before exiting.
    pub fn shutdown(&self) {
        tracing::info!(active = self.active_count(), "Entity runtime shutting down");
        self.inner.shutdown.cancel();
    }
}

/// Actor task owning one entity instance
async fn run_actor<E: Entity>(runtime: Runtime, ctx: EntityContext, mut rx: mpsc::Receiver<Job<E>>) {
    let key_str = ctx.key_str().to_string();
    let generation = ctx.generation();

    let mut entity = match E::activate(&ctx).await {
        Ok(entity) => {
            tracing::debug!(key = %key_str, generation, "Entity activated");
            entity
        }
        Err(err) => {
            tracing::warn!(key = %key_str, error = %err, "Entity activation failed");
            // Callers already holding the sender still get the real error
            runtime.release(&key_str, generation);
            while let Some(job) = rx.recv().await {
                job(Err(err.clone())).await;
            }
            return;
        }
    };

    let idle_timeout = runtime.config().idle_timeout;
    let shutdown = runtime.shutdown_token();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(job) => job(Ok((&mut entity, &ctx))).await,
                None => break,
            },
            _ = tokio::time::sleep(idle_timeout) => {
                tracing::debug!(key = %key_str, generation, "Entity idle, evicting");
                break;
            }
        }
    }

    // New callers wait on the retirement; finish what was already accepted
    let retirement = Retirement::begin(&runtime, &key_str, generation);
    rx.close();
    while let Some(job) = rx.recv().await {
        job(Ok((&mut entity, &ctx))).await;
    }
    runtime.scheduler().cancel_timers(&key_str, generation);
    drop(entity);
    drop(retirement);
    tracing::debug!(key = %key_str, generation, "Entity deactivated");
}

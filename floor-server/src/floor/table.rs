//! Table entity (event-sourced)
//!
//! ```text
//! Available ─reserve─► Reserved ─seat─► Occupied ─clear─► Dirty ─clean─► Available
//!     │  ▲                 │
//!     │  └────release──────┘
//!     └─out_of_service─► OutOfService ─return─► Available
//! ```
//!
//! The site optimizer mirrors capacity and occupancy. That mirror is kept
//! in step by the handle after each command and never fails the command.

use super::optimizer::{OptimizableTableUpdate, OptimizerHandle};
use crate::runtime::{
    Aggregate, Entity, EntityContext, EntityError, EntityRef, EntityResult, EventRecord, Journal,
    Runtime,
};
use async_trait::async_trait;
use shared::EntityKey;
use shared::floor::{
    OptimizableTable, TableCreate, TableEvent, TableSnapshot, TableStatus, TableUpdate,
};
use shared::key::EntityKind;

impl Aggregate for TableSnapshot {
    type Event = TableEvent;

    fn transition(&mut self, event: &TableEvent) {
        match event {
            TableEvent::Created {
                table_id,
                number,
                floor_plan_id,
                min_capacity,
                max_capacity,
                shape,
                tags,
                combinable,
                at,
            } => {
                self.table_id = table_id.clone();
                self.number = number.clone();
                self.floor_plan_id = floor_plan_id.clone();
                self.min_capacity = *min_capacity;
                self.max_capacity = *max_capacity;
                self.shape = *shape;
                self.tags = tags.clone();
                self.combinable = *combinable;
                self.status = TableStatus::Available;
                self.is_active = true;
                self.created_at = *at;
                self.updated_at = *at;
            }
            TableEvent::Updated {
                number,
                min_capacity,
                max_capacity,
                shape,
                tags,
                combinable,
                at,
            } => {
                if let Some(v) = number {
                    self.number = v.clone();
                }
                if let Some(v) = min_capacity {
                    self.min_capacity = *v;
                }
                if let Some(v) = max_capacity {
                    self.max_capacity = *v;
                }
                if let Some(v) = shape {
                    self.shape = *v;
                }
                if let Some(v) = tags {
                    self.tags = v.clone();
                }
                if let Some(v) = combinable {
                    self.combinable = *v;
                }
                self.updated_at = *at;
            }
            TableEvent::Reserved { booking_id, at } => {
                self.status = TableStatus::Reserved;
                self.current_booking_id = Some(booking_id.clone());
                self.updated_at = *at;
            }
            TableEvent::ReservationReleased { at } => {
                self.status = TableStatus::Available;
                self.current_booking_id = None;
                self.updated_at = *at;
            }
            TableEvent::Seated {
                booking_id,
                covers,
                at,
            } => {
                self.status = TableStatus::Occupied;
                if booking_id.is_some() {
                    self.current_booking_id = booking_id.clone();
                }
                self.current_covers = *covers;
                self.seated_at = Some(*at);
                self.updated_at = *at;
            }
            TableEvent::Cleared { at } => {
                self.status = TableStatus::Dirty;
                self.current_booking_id = None;
                self.current_covers = 0;
                self.seated_at = None;
                self.updated_at = *at;
            }
            TableEvent::Cleaned { at } | TableEvent::ReturnedToService { at } => {
                self.status = TableStatus::Available;
                self.out_of_service_reason = None;
                self.updated_at = *at;
            }
            TableEvent::TakenOutOfService { reason, at } => {
                self.status = TableStatus::OutOfService;
                self.out_of_service_reason = Some(reason.clone());
                self.current_booking_id = None;
                self.updated_at = *at;
            }
            TableEvent::Deactivated { at } => {
                self.is_active = false;
                self.updated_at = *at;
            }
        }
        self.version += 1;
    }
}

fn validate_capacity(min: u32, max: u32) -> EntityResult<()> {
    if max == 0 || min > max {
        return Err(EntityError::validation(format!(
            "invalid capacity range {min}..={max}"
        )));
    }
    Ok(())
}

fn illegal(action: &str, status: TableStatus) -> EntityError {
    EntityError::invalid_transition(format!("cannot {action} a table that is {status:?}"))
}

pub struct Table {
    journal: Journal<TableSnapshot>,
}

#[async_trait]
impl Entity for Table {
    const KIND: EntityKind = EntityKind::Table;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            journal: Journal::load(ctx)?,
        })
    }
}

impl Table {
    fn state(&self, ctx: &EntityContext) -> EntityResult<&TableSnapshot> {
        let state = self.journal.state();
        if !state.is_created() {
            return Err(EntityError::not_initialized(ctx.key()));
        }
        Ok(state)
    }

    /// Guard, build events from the current state, append
    fn command(
        &mut self,
        ctx: &EntityContext,
        build: impl FnOnce(&TableSnapshot, i64) -> EntityResult<Vec<TableEvent>>,
    ) -> EntityResult<TableSnapshot> {
        let now = ctx.now_millis();
        let events = build(self.state(ctx)?, now)?;
        for event in &events {
            tracing::debug!(key = %ctx.key(), ?event, "Table event");
        }
        Ok(self.journal.raise(events, now)?.clone())
    }

    fn create(&mut self, input: TableCreate, ctx: &EntityContext) -> EntityResult<TableSnapshot> {
        if self.journal.state().is_created() {
            return Ok(self.journal.state().clone());
        }
        validate_capacity(input.min_capacity, input.max_capacity)?;
        if input.number.trim().is_empty() {
            return Err(EntityError::validation("table number is required"));
        }
        let now = ctx.now_millis();
        let event = TableEvent::Created {
            table_id: ctx.key().id.clone(),
            number: input.number,
            floor_plan_id: input.floor_plan_id,
            min_capacity: input.min_capacity,
            max_capacity: input.max_capacity,
            shape: input.shape,
            tags: input.tags,
            combinable: input.combinable,
            at: now,
        };
        tracing::info!(key = %ctx.key(), "Table created");
        Ok(self.journal.raise(vec![event], now)?.clone())
    }
}

fn to_optimizable(table: &TableSnapshot) -> OptimizableTable {
    let mut out = OptimizableTable::new(
        table.table_id.clone(),
        table.number.clone(),
        table.min_capacity,
        table.max_capacity,
    );
    out.combinable = table.combinable;
    out.tags = table.tags.clone();
    out.is_active = table.is_active && table.status != TableStatus::OutOfService;
    out
}

/// Typed handle for one table
#[derive(Clone)]
pub struct TableHandle {
    inner: EntityRef<Table>,
}

impl TableHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, table_id: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::table(org, site, table_id)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    fn optimizer(&self) -> OptimizerHandle {
        let key = self.inner.key();
        OptimizerHandle::new(self.inner.runtime(), &key.org, &key.site)
    }

    async fn command<F>(&self, build: F) -> EntityResult<TableSnapshot>
    where
        F: FnOnce(&TableSnapshot, i64) -> EntityResult<Vec<TableEvent>> + Send + 'static,
    {
        self.inner
            .call(move |table, ctx| Box::pin(async move { table.command(ctx, build) }))
            .await
    }

    fn sync<T>(&self, what: &str, result: EntityResult<T>) {
        if let Err(e) = result {
            tracing::warn!(key = %self.key(), sync = what, error = %e, "Optimizer sync skipped");
        }
    }

    /// Idempotent; registers the table with the site optimizer
    pub async fn create(&self, input: TableCreate) -> EntityResult<TableSnapshot> {
        let table = self
            .inner
            .call(move |table, ctx| Box::pin(async move { table.create(input, ctx) }))
            .await?;
        let result = self.optimizer().register_table(to_optimizable(&table)).await;
        self.sync("register", result);
        Ok(table)
    }

    pub async fn update(&self, update: TableUpdate) -> EntityResult<TableSnapshot> {
        let patch = OptimizableTableUpdate {
            number: update.number.clone(),
            min_capacity: update.min_capacity,
            max_capacity: update.max_capacity,
            combinable: update.combinable,
            tags: update.tags.clone(),
            ..Default::default()
        };
        let table = self
            .command(move |s, at| {
                validate_capacity(
                    update.min_capacity.unwrap_or(s.min_capacity),
                    update.max_capacity.unwrap_or(s.max_capacity),
                )?;
                if update.number.as_deref().is_some_and(|n| n.trim().is_empty()) {
                    return Err(EntityError::validation("table number is required"));
                }
                Ok(vec![TableEvent::Updated {
                    number: update.number,
                    min_capacity: update.min_capacity,
                    max_capacity: update.max_capacity,
                    shape: update.shape,
                    tags: update.tags,
                    combinable: update.combinable,
                    at,
                }])
            })
            .await?;
        let result = self.optimizer().update_table(&table.table_id, patch).await;
        self.sync("update", result);
        Ok(table)
    }

    pub async fn reserve(&self, booking_id: &str) -> EntityResult<TableSnapshot> {
        let booking_id = booking_id.to_string();
        self.command(move |s, at| {
            if !s.is_active {
                return Err(EntityError::invalid_transition("table is deactivated"));
            }
            if s.status != TableStatus::Available {
                return Err(illegal("reserve", s.status));
            }
            Ok(vec![TableEvent::Reserved { booking_id, at }])
        })
        .await
    }

    pub async fn release(&self) -> EntityResult<TableSnapshot> {
        self.command(|s, at| {
            if s.status != TableStatus::Reserved {
                return Err(illegal("release", s.status));
            }
            Ok(vec![TableEvent::ReservationReleased { at }])
        })
        .await
    }

    /// Seat a party; an occupied table is an illegal transition
    pub async fn seat(&self, booking_id: Option<String>, covers: u32) -> EntityResult<TableSnapshot> {
        let table = self
            .command(move |s, at| {
                if covers == 0 {
                    return Err(EntityError::validation("covers must be positive"));
                }
                if !s.is_active {
                    return Err(EntityError::invalid_transition("table is deactivated"));
                }
                match s.status {
                    TableStatus::Available => {}
                    TableStatus::Reserved => {
                        if let (Some(held), Some(requested)) =
                            (s.current_booking_id.as_deref(), booking_id.as_deref())
                            && held != requested
                        {
                            return Err(EntityError::invalid_transition(format!(
                                "table is reserved for booking {held}"
                            )));
                        }
                    }
                    other => return Err(illegal("seat", other)),
                }
                Ok(vec![TableEvent::Seated {
                    booking_id,
                    covers,
                    at,
                }])
            })
            .await?;
        let result = self.optimizer().record_usage(&table.table_id, covers).await;
        self.sync("usage", result);
        Ok(table)
    }

    /// Guests left; the table needs bussing
    pub async fn clear(&self) -> EntityResult<TableSnapshot> {
        let table = self
            .command(|s, at| {
                if s.status != TableStatus::Occupied {
                    return Err(illegal("clear", s.status));
                }
                Ok(vec![TableEvent::Cleared { at }])
            })
            .await?;
        let result = self.optimizer().clear_usage(&table.table_id).await;
        self.sync("usage", result);
        Ok(table)
    }

    pub async fn mark_clean(&self) -> EntityResult<TableSnapshot> {
        self.command(|s, at| {
            if s.status != TableStatus::Dirty {
                return Err(illegal("clean", s.status));
            }
            Ok(vec![TableEvent::Cleaned { at }])
        })
        .await
    }

    pub async fn take_out_of_service(&self, reason: &str) -> EntityResult<TableSnapshot> {
        let reason = reason.trim().to_string();
        let table = self
            .command(move |s, at| {
                if reason.is_empty() {
                    return Err(EntityError::validation("a reason is required"));
                }
                if matches!(s.status, TableStatus::Occupied | TableStatus::OutOfService) {
                    return Err(illegal("take out of service", s.status));
                }
                Ok(vec![TableEvent::TakenOutOfService { reason, at }])
            })
            .await?;
        self.sync_active(&table).await;
        Ok(table)
    }

    pub async fn return_to_service(&self) -> EntityResult<TableSnapshot> {
        let table = self
            .command(|s, at| {
                if s.status != TableStatus::OutOfService {
                    return Err(illegal("return to service", s.status));
                }
                Ok(vec![TableEvent::ReturnedToService { at }])
            })
            .await?;
        self.sync_active(&table).await;
        Ok(table)
    }

    /// Soft delete; the event log stays
    pub async fn deactivate(&self) -> EntityResult<TableSnapshot> {
        let table = self
            .command(|s, at| {
                if !s.is_active {
                    return Err(EntityError::invalid_transition("table is already deactivated"));
                }
                if s.status == TableStatus::Occupied {
                    return Err(illegal("deactivate", s.status));
                }
                Ok(vec![TableEvent::Deactivated { at }])
            })
            .await?;
        self.sync_active(&table).await;
        Ok(table)
    }

    async fn sync_active(&self, table: &TableSnapshot) {
        let patch = OptimizableTableUpdate {
            is_active: Some(to_optimizable(table).is_active),
            ..Default::default()
        };
        let result = self.optimizer().update_table(&table.table_id, patch).await;
        self.sync("active", result);
    }

    pub async fn get_state(&self) -> EntityResult<TableSnapshot> {
        self.inner
            .call(|table, ctx| Box::pin(async move { table.state(ctx).cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|table, _| {
                Box::pin(async move { Ok::<_, EntityError>(table.journal.state().is_created()) })
            })
            .await
    }

    pub async fn history(&self) -> EntityResult<Vec<EventRecord<TableEvent>>> {
        self.inner
            .call(|table, ctx| {
                Box::pin(async move {
                    table.state(ctx)?;
                    table.journal.history()
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floor::optimizer::TableOptimizer;
    use crate::runtime::RedbStore;
    use std::sync::Arc;

    fn runtime() -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        Runtime::builder(store)
            .register::<Table>()
            .register::<TableOptimizer>()
            .build()
    }

    fn four_top() -> TableCreate {
        TableCreate {
            number: "12".into(),
            floor_plan_id: Some("main".into()),
            min_capacity: 2,
            max_capacity: 4,
            shape: Default::default(),
            tags: vec!["window".into()],
            combinable: false,
        }
    }

    #[tokio::test]
    async fn test_full_turn() {
        let rt = runtime();
        let table = TableHandle::new(&rt, "acme", "s1", "t12");
        table.create(four_top()).await.unwrap();

        table.reserve("b-1").await.unwrap();
        let seated = table.seat(Some("b-1".into()), 3).await.unwrap();
        assert_eq!(seated.status, TableStatus::Occupied);
        assert_eq!(seated.current_booking_id.as_deref(), Some("b-1"));

        assert!(matches!(
            table.seat(None, 2).await,
            Err(EntityError::InvalidStateTransition(_))
        ));

        let cleared = table.clear().await.unwrap();
        assert_eq!(cleared.status, TableStatus::Dirty);
        assert_eq!(cleared.current_covers, 0);
        let clean = table.mark_clean().await.unwrap();
        assert_eq!(clean.status, TableStatus::Available);
        assert_eq!(clean.version, 5);
        assert_eq!(table.history().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_reserved_for_another_booking() {
        let rt = runtime();
        let table = TableHandle::new(&rt, "acme", "s1", "t12");
        table.create(four_top()).await.unwrap();
        table.reserve("b-1").await.unwrap();
        assert!(table.seat(Some("b-2".into()), 2).await.is_err());
        assert!(table.reserve("b-2").await.is_err());
        table.release().await.unwrap();
        table.seat(Some("b-2".into()), 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_optimizer_mirror() {
        let rt = runtime();
        let optimizer = OptimizerHandle::new(&rt, "acme", "s1");
        let table = TableHandle::new(&rt, "acme", "s1", "t12");

        // No optimizer yet: the table still works
        table.create(four_top()).await.unwrap();
        assert!(!optimizer.exists().await.unwrap());

        optimizer.initialize().await.unwrap();
        let other = TableHandle::new(&rt, "acme", "s1", "t13");
        other.create(four_top()).await.unwrap();
        other.seat(None, 4).await.unwrap();
        let state = optimizer.get_state().await.unwrap();
        let mirrored = state.table("t13").unwrap();
        assert!(mirrored.is_occupied);
        assert_eq!(mirrored.current_covers, 4);

        other.clear().await.unwrap();
        other.mark_clean().await.unwrap();
        other.take_out_of_service("wobbly leg").await.unwrap();
        assert!(!optimizer.get_state().await.unwrap().table("t13").unwrap().is_active);
    }

    fn turn_events() -> Vec<TableEvent> {
        vec![
            TableEvent::Created {
                table_id: "t12".into(),
                number: "12".into(),
                floor_plan_id: Some("main".into()),
                min_capacity: 2,
                max_capacity: 4,
                shape: Default::default(),
                tags: vec!["window".into()],
                combinable: false,
                at: 1,
            },
            TableEvent::Updated {
                number: None,
                min_capacity: None,
                max_capacity: Some(6),
                shape: None,
                tags: None,
                combinable: Some(true),
                at: 2,
            },
            TableEvent::Reserved {
                booking_id: "b-1".into(),
                at: 3,
            },
            TableEvent::Seated {
                booking_id: Some("b-1".into()),
                covers: 5,
                at: 4,
            },
            TableEvent::Cleared { at: 5 },
            TableEvent::Cleaned { at: 6 },
            TableEvent::TakenOutOfService {
                reason: "wobbly leg".into(),
                at: 7,
            },
            TableEvent::ReturnedToService { at: 8 },
        ]
    }

    #[test]
    fn test_prefix_replay_matches_incremental_state() {
        let events = turn_events();
        let mut incremental = TableSnapshot::default();
        for (i, event) in events.iter().enumerate() {
            incremental.transition(event);
            assert_eq!(TableSnapshot::replay(&events[..=i]), incremental);
        }
        assert_eq!(TableSnapshot::replay(&events), TableSnapshot::replay(&events));
        assert_eq!(incremental.status, TableStatus::Available);
        assert_eq!(incremental.max_capacity, 6);
        assert!(incremental.combinable);
        assert_eq!(incremental.version, events.len() as u64);
    }

    #[tokio::test]
    async fn test_state_survives_runtime_restart() {
        let store: Arc<dyn crate::runtime::DurableStore> =
            Arc::new(RedbStore::open_in_memory().unwrap());

        let first = Runtime::builder(store.clone())
            .register::<Table>()
            .register::<TableOptimizer>()
            .build();
        let table = TableHandle::new(&first, "acme", "s1", "t12");
        table.create(four_top()).await.unwrap();
        table.reserve("b-1").await.unwrap();
        let before = table.seat(Some("b-1".into()), 3).await.unwrap();
        let history_len = table.history().await.unwrap().len();
        first.shutdown();
        drop(first);

        let second = Runtime::builder(store)
            .register::<Table>()
            .register::<TableOptimizer>()
            .build();
        let table = TableHandle::new(&second, "acme", "s1", "t12");
        let after = table.get_state().await.unwrap();
        assert_eq!(after, before);
        assert_eq!(table.history().await.unwrap().len(), history_len);

        // Commands keep appending after the reloaded version
        let cleared = table.clear().await.unwrap();
        assert_eq!(cleared.version, before.version + 1);
        second.shutdown();
    }

    #[tokio::test]
    async fn test_validation_and_deactivate() {
        let rt = runtime();
        let table = TableHandle::new(&rt, "acme", "s1", "t1");
        assert!(matches!(
            table.reserve("b-1").await,
            Err(EntityError::NotInitialized(_))
        ));
        assert!(
            table
                .create(TableCreate {
                    min_capacity: 6,
                    ..four_top()
                })
                .await
                .is_err()
        );
        table.create(four_top()).await.unwrap();
        assert!(
            table
                .update(TableUpdate {
                    max_capacity: Some(1),
                    ..Default::default()
                })
                .await
                .is_err()
        );
        let state = table.deactivate().await.unwrap();
        assert!(!state.is_active);
        assert!(table.reserve("b-1").await.is_err());
    }
}

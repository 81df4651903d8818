//! Offline sync queue (snapshot, one per device)
//!
//! A device that worked offline replays its writes here. Each operation
//! carries the server version the client based its change on; a pass
//! compares it with the [`SyncTarget`]'s current version and resolves
//! mismatches by the queue's [`ConflictStrategy`]:
//!
//! | Strategy | On conflict |
//! |----------|-------------|
//! | `ServerWins` | operation discarded |
//! | `ClientWins` | operation applied anyway |
//! | `Manual` | parked until `resolve_conflict` |
//!
//! Target failures leave the operation pending and arm a durable `retry`
//! reminder with exponential backoff; `max_attempts` failures mark it failed.

use crate::core::config::SyncConfig;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use crate::services::collaborators::SyncTarget;
use async_trait::async_trait;
use shared::EntityKey;
use shared::key::EntityKind;
use shared::models::{
    ConflictResolution, ConflictStrategy, OfflineSyncSnapshot, SyncOperation, SyncOperationInput,
    SyncOperationStatus, SyncReport,
};
use shared::util::new_id;

const RETRY_REMINDER: &str = "retry";

pub struct OfflineSyncQueue {
    cell: SnapshotCell<OfflineSyncSnapshot>,
}

#[async_trait]
impl Entity for OfflineSyncQueue {
    const KIND: EntityKind = EntityKind::OfflineSync;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }

    async fn receive_reminder(&mut self, name: &str, ctx: &EntityContext) -> EntityResult<()> {
        if name != RETRY_REMINDER {
            tracing::warn!(key = %ctx.key(), reminder = name, "Unknown reminder");
            return Ok(());
        }
        let report = self.process(ctx).await?;
        tracing::debug!(key = %ctx.key(), ?report, "Sync retry pass");
        Ok(())
    }
}

fn config(ctx: &EntityContext) -> SyncConfig {
    ctx.data::<SyncConfig>()
        .map(|c| c.as_ref().clone())
        .unwrap_or_default()
}

fn record_failure(op: &mut SyncOperation, error: String, max_attempts: u32, now: i64) {
    op.attempts += 1;
    op.last_error = Some(error);
    if op.attempts >= max_attempts {
        op.status = SyncOperationStatus::Failed;
        op.resolved_at = Some(now);
    }
}

async fn apply(target: &dyn SyncTarget, op: &mut SyncOperation, max_attempts: u32, now: i64) {
    let result = target.apply(op).await;
    match result {
        Ok(version) => {
            op.status = SyncOperationStatus::Applied;
            op.server_version = Some(version);
            op.last_error = None;
            op.resolved_at = Some(now);
        }
        Err(e) => record_failure(op, e.to_string(), max_attempts, now),
    }
}

/// One attempt at a pending operation; the outcome is left in `op.status`
async fn attempt(
    target: &dyn SyncTarget,
    op: &mut SyncOperation,
    strategy: ConflictStrategy,
    max_attempts: u32,
    now: i64,
) {
    let current = match target.current_version(&op.resource, &op.resource_id).await {
        Ok(v) => v,
        Err(e) => return record_failure(op, e.to_string(), max_attempts, now),
    };
    op.server_version = current;
    if current.unwrap_or(0) != op.client_version {
        match strategy {
            ConflictStrategy::ServerWins => {
                op.status = SyncOperationStatus::Discarded;
                op.resolved_at = Some(now);
                return;
            }
            ConflictStrategy::Manual => {
                op.status = SyncOperationStatus::Conflict;
                return;
            }
            ConflictStrategy::ClientWins => {}
        }
    }
    apply(target, op, max_attempts, now).await;
}

impl OfflineSyncQueue {
    fn ensure(&mut self, strategy: Option<ConflictStrategy>, ctx: &EntityContext) -> EntityResult<&OfflineSyncSnapshot> {
        if !self.cell.exists() {
            let now = ctx.now_millis();
            self.cell.set(OfflineSyncSnapshot {
                device_id: ctx.key().id.clone(),
                strategy: strategy.unwrap_or(config(ctx).default_strategy),
                operations: Vec::new(),
                last_synced_at: None,
                created_at: now,
                updated_at: now,
            })?;
        }
        self.cell.get()
    }

    fn enqueue(&mut self, input: SyncOperationInput, ctx: &EntityContext) -> EntityResult<SyncOperation> {
        if input.resource.is_empty() || input.resource_id.is_empty() {
            return Err(EntityError::validation("resource and resource_id are required"));
        }
        self.ensure(None, ctx)?;
        let now = ctx.now_millis();
        let op = SyncOperation {
            op_id: new_id(),
            resource: input.resource,
            resource_id: input.resource_id,
            action: input.action,
            payload: input.payload,
            client_version: input.client_version,
            status: SyncOperationStatus::Pending,
            attempts: 0,
            server_version: None,
            last_error: None,
            queued_at: now,
            resolved_at: None,
        };
        self.cell.update(|s| {
            s.operations.push(op.clone());
            s.updated_at = now;
            Ok(())
        })?;
        Ok(op)
    }

    /// Attempt every pending operation in queue order
    async fn process(&mut self, ctx: &EntityContext) -> EntityResult<SyncReport> {
        let Some(state) = self.cell.peek() else {
            return Ok(SyncReport::default());
        };
        let Some(target) = ctx.data::<dyn SyncTarget>() else {
            tracing::warn!(key = %ctx.key(), "No sync target configured, operations stay pending");
            return Ok(SyncReport::default());
        };
        let cfg = config(ctx);
        let strategy = state.strategy;
        let pending: Vec<SyncOperation> = state
            .operations
            .iter()
            .filter(|op| op.status == SyncOperationStatus::Pending)
            .cloned()
            .collect();

        let now = ctx.now_millis();
        let mut report = SyncReport::default();
        let mut outcomes = Vec::with_capacity(pending.len());
        for mut op in pending {
            attempt(target.as_ref(), &mut op, strategy, cfg.max_attempts, now).await;
            match op.status {
                SyncOperationStatus::Applied => report.applied += 1,
                SyncOperationStatus::Discarded => report.discarded += 1,
                SyncOperationStatus::Conflict => report.conflicts += 1,
                SyncOperationStatus::Failed => report.failed += 1,
                SyncOperationStatus::Pending => report.retrying += 1,
            }
            outcomes.push(op);
        }
        let retry_after = outcomes
            .iter()
            .filter(|op| op.status == SyncOperationStatus::Pending)
            .map(|op| op.attempts)
            .min();

        self.cell.update(|s| {
            for op in outcomes {
                if let Some(slot) = s.operations.iter_mut().find(|o| o.op_id == op.op_id) {
                    *slot = op;
                }
            }
            s.last_synced_at = Some(now);
            s.updated_at = now;
            Ok(())
        })?;

        match retry_after {
            Some(attempts) => {
                let due_at = now + cfg.backoff(attempts.saturating_sub(1)).as_millis() as i64;
                ctx.register_reminder(RETRY_REMINDER, due_at, None)?;
            }
            None => ctx.unregister_reminder(RETRY_REMINDER)?,
        }
        tracing::info!(
            key = %ctx.key(),
            applied = report.applied,
            discarded = report.discarded,
            conflicts = report.conflicts,
            retrying = report.retrying,
            failed = report.failed,
            "Sync pass finished"
        );
        Ok(report)
    }

    async fn resolve_conflict(
        &mut self,
        op_id: String,
        resolution: ConflictResolution,
        ctx: &EntityContext,
    ) -> EntityResult<SyncOperation> {
        let mut op = self
            .cell
            .get()?
            .operations
            .iter()
            .find(|o| o.op_id == op_id)
            .cloned()
            .ok_or_else(|| EntityError::not_found(format!("sync operation {op_id}")))?;
        if op.status != SyncOperationStatus::Conflict {
            return Err(EntityError::invalid_transition(format!(
                "sync operation is {:?}, not in conflict",
                op.status
            )));
        }

        let now = ctx.now_millis();
        match resolution {
            ConflictResolution::KeepServer => {
                op.status = SyncOperationStatus::Discarded;
                op.resolved_at = Some(now);
            }
            ConflictResolution::KeepClient => {
                let target = ctx.data::<dyn SyncTarget>().ok_or_else(|| {
                    EntityError::Unavailable("no sync target configured".into())
                })?;
                let version = target
                    .apply(&op)
                    .await
                    .map_err(|e| EntityError::Unavailable(e.to_string()))?;
                op.status = SyncOperationStatus::Applied;
                op.server_version = Some(version);
                op.resolved_at = Some(now);
            }
        }
        self.cell.update(|s| {
            if let Some(slot) = s.operations.iter_mut().find(|o| o.op_id == op.op_id) {
                *slot = op.clone();
            }
            s.updated_at = now;
            Ok(())
        })?;
        tracing::info!(key = %ctx.key(), op_id = %op.op_id, ?resolution, "Sync conflict resolved");
        Ok(op)
    }

    /// Drop applied and discarded operations
    fn compact(&mut self, now: i64) -> EntityResult<usize> {
        self.cell.update(|s| {
            let before = s.operations.len();
            s.operations.retain(|op| {
                !matches!(
                    op.status,
                    SyncOperationStatus::Applied | SyncOperationStatus::Discarded
                )
            });
            s.updated_at = now;
            Ok(before - s.operations.len())
        })
    }
}

#[derive(Clone)]
pub struct OfflineSyncHandle {
    inner: EntityRef<OfflineSyncQueue>,
}

impl OfflineSyncHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, device_id: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::offline_sync(org, site, device_id)),
        }
    }

    /// Idempotent; `None` takes the configured default strategy
    pub async fn initialize(&self, strategy: Option<ConflictStrategy>) -> EntityResult<OfflineSyncSnapshot> {
        self.inner
            .call(move |q, ctx| Box::pin(async move { q.ensure(strategy, ctx).cloned() }))
            .await
    }

    pub async fn set_strategy(&self, strategy: ConflictStrategy) -> EntityResult<OfflineSyncSnapshot> {
        self.inner
            .call(move |q, ctx| {
                Box::pin(async move {
                    let now = ctx.now_millis();
                    q.cell.update(|s| {
                        s.strategy = strategy;
                        s.updated_at = now;
                        Ok(s.clone())
                    })
                })
            })
            .await
    }

    pub async fn enqueue(&self, input: SyncOperationInput) -> EntityResult<SyncOperation> {
        self.inner
            .call(move |q, ctx| Box::pin(async move { q.enqueue(input, ctx) }))
            .await
    }

    pub async fn process(&self) -> EntityResult<SyncReport> {
        self.inner
            .call(|q, ctx| Box::pin(async move { q.process(ctx).await }))
            .await
    }

    pub async fn resolve_conflict(
        &self,
        op_id: &str,
        resolution: ConflictResolution,
    ) -> EntityResult<SyncOperation> {
        let op_id = op_id.to_string();
        self.inner
            .call(move |q, ctx| {
                Box::pin(async move { q.resolve_conflict(op_id, resolution, ctx).await })
            })
            .await
    }

    /// Pending and parked operations
    pub async fn outstanding(&self) -> EntityResult<Vec<SyncOperation>> {
        self.inner
            .call(|q, _| {
                Box::pin(async move {
                    let Some(state) = q.cell.peek() else {
                        return Ok::<_, EntityError>(Vec::new());
                    };
                    Ok(state
                        .operations
                        .iter()
                        .filter(|op| {
                            matches!(
                                op.status,
                                SyncOperationStatus::Pending | SyncOperationStatus::Conflict
                            )
                        })
                        .cloned()
                        .collect())
                })
            })
            .await
    }

    pub async fn compact(&self) -> EntityResult<usize> {
        self.inner
            .call(|q, ctx| Box::pin(async move { q.compact(ctx.now_millis()) }))
            .await
    }

    pub async fn get_state(&self) -> EntityResult<OfflineSyncSnapshot> {
        self.inner
            .call(|q, _| Box::pin(async move { q.cell.get().cloned() }))
            .await
    }
}

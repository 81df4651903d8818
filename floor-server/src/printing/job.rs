//! Print job entity (snapshot)
//!
//! `Queued → Printing → Completed | Failed`, plus `Cancelled` from any
//! non-terminal state. A failed attempt below `max_retries` goes back to
//! `Queued` and arms a durable `retry` reminder after `2^retry × base`;
//! when it fires the job re-enters its printer queue.

use super::queue::PrintQueueHandle;
use crate::core::config::PrintConfig;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use shared::EntityKey;
use shared::key::EntityKind;
use shared::models::{PrintJobCreate, PrintJobSnapshot, PrintJobStatus};

const RETRY_REMINDER: &str = "retry";

pub struct PrintJob {
    cell: SnapshotCell<PrintJobSnapshot>,
}

#[async_trait]
impl Entity for PrintJob {
    const KIND: EntityKind = EntityKind::PrintJob;

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
        let Some(state) = self.cell.peek().cloned() else {
            return Ok(());
        };
        if state.status != PrintJobStatus::Queued || state.next_retry_at.is_none() {
            return Ok(());
        }
        let key = ctx.key();
        let queue = PrintQueueHandle::new(ctx.runtime(), &key.org, &key.site, &state.printer_id);
        queue.enqueue(&state.job_id, state.priority).await?;

        let now = ctx.now_millis();
        self.cell.update(|s| {
            s.next_retry_at = None;
            s.updated_at = now;
            Ok(())
        })?;
        tracing::info!(key = %key, retry = state.retry_count, "Print job re-enqueued");
        Ok(())
    }
}

impl PrintJob {
    fn create(&mut self, input: PrintJobCreate, ctx: &EntityContext) -> EntityResult<PrintJobSnapshot> {
        if let Some(existing) = self.cell.peek() {
            return Ok(existing.clone());
        }
        if input.printer_id.trim().is_empty() {
            return Err(EntityError::validation("printer_id is required"));
        }
        let max_retries = ctx
            .data::<PrintConfig>()
            .map(|c| c.max_retries)
            .unwrap_or_else(|| PrintConfig::default().max_retries);
        let now = ctx.now_millis();
        let state = self.cell.set(PrintJobSnapshot {
            job_id: ctx.key().id.clone(),
            printer_id: input.printer_id,
            kind: input.kind,
            content: input.content,
            priority: input.priority,
            status: PrintJobStatus::Queued,
            retry_count: 0,
            max_retries,
            last_error: None,
            next_retry_at: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        })?;
        tracing::debug!(key = %ctx.key(), printer_id = %state.printer_id, "Print job created");
        Ok(state.clone())
    }

    fn start(&mut self, now: i64) -> EntityResult<PrintJobSnapshot> {
        self.cell.update(|s| {
            if s.status != PrintJobStatus::Queued || s.next_retry_at.is_some() {
                return Err(EntityError::invalid_transition(format!(
                    "cannot start a {:?} print job",
                    s.status
                )));
            }
            s.status = PrintJobStatus::Printing;
            s.started_at = Some(now);
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn complete(&mut self, now: i64) -> EntityResult<PrintJobSnapshot> {
        self.cell.update(|s| {
            if s.status != PrintJobStatus::Printing {
                return Err(EntityError::invalid_transition(format!(
                    "cannot complete a {:?} print job",
                    s.status
                )));
            }
            s.status = PrintJobStatus::Completed;
            s.finished_at = Some(now);
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn fail(&mut self, error: String, ctx: &EntityContext) -> EntityResult<PrintJobSnapshot> {
        let cfg = ctx.data::<PrintConfig>().map(|c| c.as_ref().clone()).unwrap_or_default();
        let now = ctx.now_millis();
        let state = self.cell.update(|s| {
            if s.status != PrintJobStatus::Printing {
                return Err(EntityError::invalid_transition(format!(
                    "cannot fail a {:?} print job",
                    s.status
                )));
            }
            s.last_error = Some(error);
            s.updated_at = now;
            if s.retry_count < s.max_retries {
                let delay = cfg.backoff(s.retry_count);
                s.retry_count += 1;
                s.status = PrintJobStatus::Queued;
                s.next_retry_at = Some(now + delay.as_millis() as i64);
            } else {
                s.status = PrintJobStatus::Failed;
                s.finished_at = Some(now);
            }
            Ok(s.clone())
        })?;

        match state.next_retry_at {
            Some(due_at) if state.status == PrintJobStatus::Queued => {
                ctx.register_reminder(RETRY_REMINDER, due_at, None)?;
                tracing::warn!(
                    key = %ctx.key(),
                    retry = state.retry_count,
                    due_at,
                    error = ?state.last_error,
                    "Print failed, retry scheduled"
                );
            }
            _ => {
                tracing::error!(key = %ctx.key(), error = ?state.last_error, "Print job failed permanently");
            }
        }
        Ok(state)
    }

    fn cancel(&mut self, ctx: &EntityContext) -> EntityResult<PrintJobSnapshot> {
        let now = ctx.now_millis();
        let state = self.cell.update(|s| {
            if s.status.is_terminal() {
                return Err(EntityError::invalid_transition(format!(
                    "print job is already {:?}",
                    s.status
                )));
            }
            s.status = PrintJobStatus::Cancelled;
            s.next_retry_at = None;
            s.finished_at = Some(now);
            s.updated_at = now;
            Ok(s.clone())
        })?;
        ctx.unregister_reminder(RETRY_REMINDER)?;
        Ok(state)
    }
}

#[derive(Clone)]
pub struct PrintJobHandle {
    inner: EntityRef<PrintJob>,
}

impl PrintJobHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, job_id: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::print_job(org, site, job_id)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    /// Idempotent
    pub async fn create(&self, input: PrintJobCreate) -> EntityResult<PrintJobSnapshot> {
        self.inner
            .call(move |j, ctx| Box::pin(async move { j.create(input, ctx) }))
            .await
    }

    pub async fn start(&self) -> EntityResult<PrintJobSnapshot> {
        self.inner
            .call(|j, ctx| Box::pin(async move { j.start(ctx.now_millis()) }))
            .await
    }

    pub async fn complete(&self) -> EntityResult<PrintJobSnapshot> {
        self.inner
            .call(|j, ctx| Box::pin(async move { j.complete(ctx.now_millis()) }))
            .await
    }

    /// Back to `Queued` with a retry reminder, or `Failed` once retries run out
    pub async fn fail(&self, error: impl Into<String>) -> EntityResult<PrintJobSnapshot> {
        let error = error.into();
        self.inner
            .call(move |j, ctx| Box::pin(async move { j.fail(error, ctx) }))
            .await
    }

    pub async fn cancel(&self) -> EntityResult<PrintJobSnapshot> {
        self.inner
            .call(|j, ctx| Box::pin(async move { j.cancel(ctx) }))
            .await
    }

    pub async fn get_state(&self) -> EntityResult<PrintJobSnapshot> {
        self.inner
            .call(|j, _| Box::pin(async move { j.cell.get().cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|j, _| Box::pin(async move { Ok::<_, EntityError>(j.cell.exists()) }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::PrintQueue;
    use crate::runtime::{ManualClock, RedbStore};
    use std::sync::Arc;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    fn runtime(clock: Arc<ManualClock>) -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        Runtime::builder(store)
            .clock(clock)
            .with_data(Arc::new(PrintConfig {
                max_retries: 3,
                backoff_base: Duration::from_secs(5),
            }))
            .register::<PrintJob>()
            .register::<PrintQueue>()
            .build()
    }

    fn ticket() -> PrintJobCreate {
        PrintJobCreate {
            printer_id: "kitchen".into(),
            kind: Default::default(),
            content: "2x paella".into(),
            priority: 0,
        }
    }

    /// Deliver the retry reminder now instead of waiting for the backoff
    async fn fire_retry(job: &PrintJobHandle) {
        job.inner
            .call(|j, ctx| Box::pin(async move { j.receive_reminder(RETRY_REMINDER, ctx).await }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_backoff_schedule_then_failed() {
        let rt = runtime(Arc::new(ManualClock::new(T0)));
        let job = PrintJobHandle::new(&rt, "acme", "s1", "j1");
        job.create(ticket()).await.unwrap();

        let mut delays = Vec::new();
        for _ in 0..3 {
            job.start().await.unwrap();
            let state = job.fail("paper jam").await.unwrap();
            assert_eq!(state.status, PrintJobStatus::Queued);
            delays.push(state.next_retry_at.unwrap() - T0);

            // Waiting for the retry, not startable yet
            assert!(job.start().await.is_err());
            fire_retry(&job).await;
        }
        assert_eq!(delays, vec![5_000, 10_000, 20_000]);

        let queue = PrintQueueHandle::new(&rt, "acme", "s1", "kitchen");
        let pending = queue.get_state().await.unwrap().pending;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job_id, "j1");

        job.start().await.unwrap();
        let state = job.fail("paper jam").await.unwrap();
        assert_eq!(state.status, PrintJobStatus::Failed);
        assert_eq!(state.retry_count, 3);
        assert_eq!(state.last_error.as_deref(), Some("paper jam"));
    }

    #[tokio::test]
    async fn test_transitions() {
        let rt = runtime(Arc::new(ManualClock::new(T0)));
        let job = PrintJobHandle::new(&rt, "acme", "s1", "j1");
        assert!(!job.exists().await.unwrap());
        job.create(ticket()).await.unwrap();

        assert!(matches!(
            job.complete().await,
            Err(EntityError::InvalidStateTransition(_))
        ));
        job.start().await.unwrap();
        assert_eq!(job.complete().await.unwrap().status, PrintJobStatus::Completed);
        assert!(job.cancel().await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_disarms_retry() {
        let rt = runtime(Arc::new(ManualClock::new(T0)));
        let job = PrintJobHandle::new(&rt, "acme", "s1", "j1");
        job.create(ticket()).await.unwrap();
        job.start().await.unwrap();
        job.fail("offline").await.unwrap();
        assert_eq!(rt.scheduler().reminder_count(), 1);

        let state = job.cancel().await.unwrap();
        assert_eq!(state.status, PrintJobStatus::Cancelled);
        assert_eq!(rt.scheduler().reminder_count(), 0);
    }
}

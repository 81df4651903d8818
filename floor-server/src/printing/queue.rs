//! Print queue entity (snapshot, one per printer)
//!
//! Pending jobs ordered by priority (higher first), FIFO within a priority.
//! At most one job is active; the printer driver dequeues, prints and
//! reports the outcome back.

use super::job::PrintJobHandle;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use shared::EntityKey;
use shared::key::EntityKind;
use shared::models::{
    PrintJobCreate, PrintJobSnapshot, PrintJobStatus, PrintOutcome, PrintQueueSnapshot, QueuedJob,
};
use shared::util::new_id;

pub struct PrintQueue {
    cell: SnapshotCell<PrintQueueSnapshot>,
}

#[async_trait]
impl Entity for PrintQueue {
    const KIND: EntityKind = EntityKind::PrintQueue;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }
}

impl PrintQueue {
    fn job(ctx: &EntityContext, job_id: &str) -> PrintJobHandle {
        let key = ctx.key();
        PrintJobHandle::new(ctx.runtime(), &key.org, &key.site, job_id)
    }

    fn enqueue(&mut self, job_id: String, priority: i32, ctx: &EntityContext) -> EntityResult<()> {
        let now = ctx.now_millis();
        if !self.cell.exists() {
            self.cell.set(PrintQueueSnapshot {
                printer_id: ctx.key().id.clone(),
                created_at: now,
                updated_at: now,
                ..Default::default()
            })?;
        }
        self.cell.update(|q| {
            let known = q.active_job_id.as_deref() == Some(job_id.as_str())
                || q.pending.iter().any(|j| j.job_id == job_id);
            if known {
                return Ok(());
            }
            let at = q.pending.partition_point(|j| j.priority >= priority);
            tracing::debug!(printer = %q.printer_id, job_id = %job_id, priority, position = at, "Print job enqueued");
            q.pending.insert(
                at,
                QueuedJob {
                    job_id,
                    priority,
                    enqueued_at: now,
                },
            );
            q.updated_at = now;
            Ok(())
        })
    }

    /// Start the next startable job; stale entries are dropped
    async fn dequeue(&mut self, ctx: &EntityContext) -> EntityResult<Option<PrintJobSnapshot>> {
        loop {
            let Some(state) = self.cell.peek() else {
                return Ok(None);
            };
            if state.paused || state.active_job_id.is_some() {
                return Ok(None);
            }
            let Some(next) = state.pending.first().cloned() else {
                return Ok(None);
            };

            let now = ctx.now_millis();
            match Self::job(ctx, &next.job_id).start().await {
                Ok(job) => {
                    self.cell.update(|q| {
                        q.pending.retain(|j| j.job_id != next.job_id);
                        q.active_job_id = Some(next.job_id.clone());
                        q.updated_at = now;
                        Ok(())
                    })?;
                    tracing::info!(key = %ctx.key(), job_id = %next.job_id, "Print job started");
                    return Ok(Some(job));
                }
                Err(EntityError::InvalidStateTransition(_) | EntityError::NotInitialized(_)) => {
                    tracing::warn!(key = %ctx.key(), job_id = %next.job_id, "Dropping unstartable print job");
                    self.cell.update(|q| {
                        q.pending.retain(|j| j.job_id != next.job_id);
                        q.updated_at = now;
                        Ok(())
                    })?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn report(
        &mut self,
        job_id: String,
        outcome: PrintOutcome,
        ctx: &EntityContext,
    ) -> EntityResult<PrintJobSnapshot> {
        if self.cell.get()?.active_job_id.as_deref() != Some(job_id.as_str()) {
            return Err(EntityError::invalid_transition(format!(
                "print job {job_id} is not active on this printer"
            )));
        }
        let job = Self::job(ctx, &job_id);
        let state = match outcome {
            PrintOutcome::Printed => job.complete().await?,
            PrintOutcome::Failed { error } => job.fail(error).await?,
        };
        let now = ctx.now_millis();
        self.cell.update(|q| {
            q.active_job_id = None;
            match state.status {
                PrintJobStatus::Completed => q.completed_count += 1,
                PrintJobStatus::Failed => q.failed_count += 1,
                _ => {}
            }
            q.updated_at = now;
            Ok(())
        })?;
        Ok(state)
    }

    async fn cancel(&mut self, job_id: String, ctx: &EntityContext) -> EntityResult<PrintJobSnapshot> {
        let state = self.cell.get()?;
        let active = state.active_job_id.as_deref() == Some(job_id.as_str());
        if !active && !state.pending.iter().any(|j| j.job_id == job_id) {
            return Err(EntityError::not_found(format!("print job {job_id} in queue")));
        }
        let job = Self::job(ctx, &job_id).cancel().await?;
        let now = ctx.now_millis();
        self.cell.update(|q| {
            q.pending.retain(|j| j.job_id != job_id);
            if active {
                q.active_job_id = None;
            }
            q.updated_at = now;
            Ok(())
        })?;
        tracing::info!(key = %ctx.key(), job_id = %job_id, "Print job cancelled");
        Ok(job)
    }

    fn set_paused(&mut self, paused: bool, now: i64) -> EntityResult<PrintQueueSnapshot> {
        self.cell.update(|q| {
            q.paused = paused;
            q.updated_at = now;
            Ok(q.clone())
        })
    }
}

#[derive(Clone)]
pub struct PrintQueueHandle {
    inner: EntityRef<PrintQueue>,
}

impl PrintQueueHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, printer_id: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::print_queue(org, site, printer_id)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    /// Create a job for this printer and queue it
    pub async fn submit(&self, mut input: PrintJobCreate) -> EntityResult<PrintJobSnapshot> {
        let key = self.key();
        input.printer_id = key.id.clone();
        let job = PrintJobHandle::new(self.inner.runtime(), &key.org, &key.site, &new_id())
            .create(input)
            .await?;
        self.enqueue(&job.job_id, job.priority).await?;
        Ok(job)
    }

    /// Idempotent while the job is pending or active
    pub async fn enqueue(&self, job_id: &str, priority: i32) -> EntityResult<()> {
        let job_id = job_id.to_string();
        self.inner
            .call(move |q, ctx| Box::pin(async move { q.enqueue(job_id, priority, ctx) }))
            .await
    }

    /// `None` when paused, busy or empty
    pub async fn dequeue(&self) -> EntityResult<Option<PrintJobSnapshot>> {
        self.inner
            .call(|q, ctx| Box::pin(async move { q.dequeue(ctx).await }))
            .await
    }

    pub async fn report(&self, job_id: &str, outcome: PrintOutcome) -> EntityResult<PrintJobSnapshot> {
        let job_id = job_id.to_string();
        self.inner
            .call(move |q, ctx| Box::pin(async move { q.report(job_id, outcome, ctx).await }))
            .await
    }

    pub async fn cancel(&self, job_id: &str) -> EntityResult<PrintJobSnapshot> {
        let job_id = job_id.to_string();
        self.inner
            .call(move |q, ctx| Box::pin(async move { q.cancel(job_id, ctx).await }))
            .await
    }

    pub async fn pause(&self) -> EntityResult<PrintQueueSnapshot> {
        self.inner
            .call(|q, ctx| Box::pin(async move { q.set_paused(true, ctx.now_millis()) }))
            .await
    }

    pub async fn resume(&self) -> EntityResult<PrintQueueSnapshot> {
        self.inner
            .call(|q, ctx| Box::pin(async move { q.set_paused(false, ctx.now_millis()) }))
            .await
    }

    pub async fn get_state(&self) -> EntityResult<PrintQueueSnapshot> {
        self.inner
            .call(|q, _| Box::pin(async move { q.cell.get().cloned() }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PrintConfig;
    use crate::printing::PrintJob;
    use crate::runtime::RedbStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn runtime(backoff: Duration) -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        Runtime::builder(store)
            .with_data(Arc::new(PrintConfig {
                max_retries: 1,
                backoff_base: backoff,
            }))
            .register::<PrintJob>()
            .register::<PrintQueue>()
            .build()
    }

    fn doc(content: &str, priority: i32) -> PrintJobCreate {
        PrintJobCreate {
            printer_id: String::new(),
            kind: Default::default(),
            content: content.into(),
            priority,
        }
    }

    #[tokio::test]
    async fn test_priority_order_and_single_active() {
        let rt = runtime(Duration::from_secs(5));
        let queue = PrintQueueHandle::new(&rt, "acme", "s1", "kitchen");
        let low = queue.submit(doc("low", 0)).await.unwrap();
        let high = queue.submit(doc("high", 10)).await.unwrap();
        let low2 = queue.submit(doc("low2", 0)).await.unwrap();
        assert_eq!(low.printer_id, "kitchen");

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.job_id, high.job_id);
        assert_eq!(first.status, PrintJobStatus::Printing);
        // One job at a time
        assert!(queue.dequeue().await.unwrap().is_none());
        assert!(queue.report(&low.job_id, PrintOutcome::Printed).await.is_err());

        queue.report(&high.job_id, PrintOutcome::Printed).await.unwrap();
        assert_eq!(queue.dequeue().await.unwrap().unwrap().job_id, low.job_id);
        queue.report(&low.job_id, PrintOutcome::Printed).await.unwrap();
        assert_eq!(queue.dequeue().await.unwrap().unwrap().job_id, low2.job_id);
        assert_eq!(queue.get_state().await.unwrap().completed_count, 2);
    }

    #[tokio::test]
    async fn test_pause_resume_and_cancel() {
        let rt = runtime(Duration::from_secs(5));
        let queue = PrintQueueHandle::new(&rt, "acme", "s1", "bar");
        let a = queue.submit(doc("a", 0)).await.unwrap();
        let b = queue.submit(doc("b", 0)).await.unwrap();

        queue.pause().await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
        queue.resume().await.unwrap();

        let cancelled = queue.cancel(&a.job_id).await.unwrap();
        assert_eq!(cancelled.status, PrintJobStatus::Cancelled);
        assert!(matches!(
            queue.cancel(&a.job_id).await,
            Err(EntityError::NotFound(_))
        ));
        assert_eq!(queue.dequeue().await.unwrap().unwrap().job_id, b.job_id);
    }

    #[tokio::test]
    async fn test_failed_job_comes_back_after_backoff() {
        let rt = runtime(Duration::from_millis(30));
        let queue = PrintQueueHandle::new(&rt, "acme", "s1", "kitchen");
        let job = queue.submit(doc("ticket", 0)).await.unwrap();
        queue.dequeue().await.unwrap().unwrap();

        let state = queue
            .report(&job.job_id, PrintOutcome::Failed { error: "offline".into() })
            .await
            .unwrap();
        assert_eq!(state.status, PrintJobStatus::Queued);
        assert!(queue.get_state().await.unwrap().pending.is_empty());

        tokio::time::sleep(Duration::from_millis(250)).await;
        let again = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(again.job_id, job.job_id);
        assert_eq!(again.retry_count, 1);

        // Retries exhausted
        let state = queue
            .report(&job.job_id, PrintOutcome::Failed { error: "offline".into() })
            .await
            .unwrap();
        assert_eq!(state.status, PrintJobStatus::Failed);
        assert_eq!(queue.get_state().await.unwrap().failed_count, 1);
    }
}

//! Outbound collaborator interfaces
//!
//! Entities reach these through runtime app data
//! (`ctx.data::<dyn Notifier>()`). Every call site treats them as best
//! effort: a failure is logged and the primary transition stands.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shared::booking::GuestInfo;
use shared::models::{SyncAction, SyncOperation};
use shared::{AppError, AppResult, ErrorCode};

// ============================================================================
// Notifier
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingConfirmed,
    BookingCancelled,
    BookingNoShow,
    DepositRequired,
    TableReady,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Booking id or waitlist entry id
    pub subject_id: String,
    pub site: String,
    pub guest_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub message: String,
}

/// Guest and staff notifications (push relay, SMS, email)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> AppResult<()>;
}

/// Default notifier: structured log line per notification
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: Notification) -> AppResult<()> {
        tracing::info!(
            kind = ?n.kind,
            subject = %n.subject_id,
            site = %n.site,
            guest = %n.guest_name,
            "{}",
            n.message
        );
        Ok(())
    }
}

// ============================================================================
// Guest history
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitOutcome {
    Completed,
    Cancelled,
    NoShow,
}

/// Guest visit record keeper (CRM)
#[async_trait]
pub trait GuestHistory: Send + Sync {
    async fn record(
        &self,
        org: &str,
        guest: &GuestInfo,
        booking_id: &str,
        covers: u32,
        outcome: VisitOutcome,
    ) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct LogGuestHistory;

#[async_trait]
impl GuestHistory for LogGuestHistory {
    async fn record(
        &self,
        org: &str,
        guest: &GuestInfo,
        booking_id: &str,
        covers: u32,
        outcome: VisitOutcome,
    ) -> AppResult<()> {
        tracing::info!(
            org = %org,
            guest = %guest.name,
            booking_id = %booking_id,
            covers,
            outcome = ?outcome,
            "Guest history recorded"
        );
        Ok(())
    }
}

// ============================================================================
// Sync target
// ============================================================================

/// Server-side authority for offline writes
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Current server version of a resource, `None` when it does not exist
    async fn current_version(&self, resource: &str, resource_id: &str) -> AppResult<Option<u64>>;

    /// Apply the operation unconditionally; returns the new server version
    async fn apply(&self, op: &SyncOperation) -> AppResult<u64>;
}

/// In-process version table, used when no remote authority is configured
#[derive(Debug, Default)]
pub struct LocalSyncTarget {
    versions: DashMap<(String, String), (u64, serde_json::Value)>,
}

impl LocalSyncTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource at a known version
    pub fn put(&self, resource: &str, resource_id: &str, version: u64, body: serde_json::Value) {
        self.versions
            .insert((resource.to_string(), resource_id.to_string()), (version, body));
    }

    pub fn get(&self, resource: &str, resource_id: &str) -> Option<(u64, serde_json::Value)> {
        self.versions
            .get(&(resource.to_string(), resource_id.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl SyncTarget for LocalSyncTarget {
    async fn current_version(&self, resource: &str, resource_id: &str) -> AppResult<Option<u64>> {
        Ok(self.get(resource, resource_id).map(|(v, _)| v))
    }

    async fn apply(&self, op: &SyncOperation) -> AppResult<u64> {
        let key = (op.resource.clone(), op.resource_id.clone());
        match op.action {
            SyncAction::Create | SyncAction::Update => {
                let mut entry = self.versions.entry(key).or_insert((0, serde_json::Value::Null));
                entry.0 += 1;
                entry.1 = op.payload.clone();
                Ok(entry.0)
            }
            SyncAction::Delete => match self.versions.remove(&key) {
                Some((_, (version, _))) => Ok(version + 1),
                None => Err(AppError::with_message(
                    ErrorCode::NotFound,
                    format!("{}/{} does not exist", op.resource, op.resource_id),
                )),
            },
        }
    }
}

//! Print job / print queue model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintJobStatus {
    #[default]
    Queued,
    Printing,
    Completed,
    Failed,
    Cancelled,
}

impl PrintJobStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrintJobStatus::Completed | PrintJobStatus::Failed | PrintJobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintJobKind {
    #[default]
    KitchenTicket,
    Receipt,
    Label,
    Report,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PrintJobSnapshot {
    pub job_id: String,
    pub printer_id: String,
    pub kind: PrintJobKind,
    /// Rendered document (printer-agnostic)
    pub content: String,
    /// Higher prints first
    pub priority: i32,
    pub status: PrintJobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<i64>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJobCreate {
    pub printer_id: String,
    #[serde(default)]
    pub kind: PrintJobKind,
    pub content: String,
    #[serde(default)]
    pub priority: i32,
}

/// Pending queue entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: String,
    pub priority: i32,
    pub enqueued_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PrintQueueSnapshot {
    pub printer_id: String,
    /// Sorted by priority descending, then enqueue order
    pub pending: Vec<QueuedJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_job_id: Option<String>,
    pub paused: bool,
    pub completed_count: u64,
    pub failed_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Printer outcome reported back to the queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintOutcome {
    Printed,
    Failed { error: String },
}

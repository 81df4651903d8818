//! Offline sync queue model
//!
//! A device that lost connectivity records its writes locally and replays
//! them through its sync queue once online again.

use serde::{Deserialize, Serialize};

/// 冲突处理策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStrategy {
    /// Discard the client change
    #[default]
    ServerWins,
    /// Apply the client change anyway
    ClientWins,
    /// Park the operation until resolved by staff
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOperationStatus {
    #[default]
    Pending,
    Applied,
    /// Waiting for manual resolution
    Conflict,
    Discarded,
    /// Retries exhausted
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncOperation {
    pub op_id: String,
    pub resource: String,
    pub resource_id: String,
    pub action: SyncAction,
    pub payload: serde_json::Value,
    /// Server version the client based its change on
    pub client_version: u64,
    pub status: SyncOperationStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub queued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperationInput {
    pub resource: String,
    pub resource_id: String,
    pub action: SyncAction,
    pub payload: serde_json::Value,
    pub client_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OfflineSyncSnapshot {
    pub device_id: String,
    pub strategy: ConflictStrategy,
    pub operations: Vec<SyncOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Manual conflict decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    KeepServer,
    KeepClient,
}

/// Summary of one processing pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SyncReport {
    pub applied: u32,
    pub discarded: u32,
    pub conflicts: u32,
    pub retrying: u32,
    pub failed: u32,
}

//! Device authorization (device-code flow) model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceCodeStatus {
    #[default]
    Pending,
    Authorized,
    Denied,
    Expired,
}

impl DeviceCodeStatus {
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, DeviceCodeStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeviceAuthSnapshot {
    pub user_code: String,
    pub device_code: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub status: DeviceCodeStatus,
    pub poll_count: u32,
    pub issued_at: i64,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_by: Option<String>,
    /// Site the device was bound to on approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthInitiate {
    pub client_id: String,
    pub device_name: Option<String>,
    pub scope: Option<String>,
}

/// Returned to the device on initiation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceCodeGrant {
    pub user_code: String,
    pub device_code: String,
    pub expires_at: i64,
    /// Minimum seconds between polls
    pub interval_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollOutcome {
    Pending,
    Authorized { authorized_by: String, site: Option<String> },
    Denied,
    Expired,
}

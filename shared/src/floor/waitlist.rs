//! Walk-in waitlist model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitlistStatus {
    Waiting,
    /// Guest was told the table is ready
    Notified,
    Seated,
    Removed,
}

impl WaitlistStatus {
    pub const fn is_waiting(&self) -> bool {
        matches!(self, WaitlistStatus::Waiting | WaitlistStatus::Notified)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitlistEntry {
    pub entry_id: String,
    pub guest_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub party_size: u32,
    pub status: WaitlistStatus,
    pub quoted_wait_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seating_preference: Option<String>,
    pub added_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WaitlistSnapshot {
    pub date: NaiveDate,
    pub entries: Vec<WaitlistEntry>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WaitlistSnapshot {
    /// Waiting entries in arrival order
    pub fn waiting(&self) -> impl Iterator<Item = &WaitlistEntry> {
        self.entries.iter().filter(|e| e.status.is_waiting())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistAdd {
    pub guest_name: String,
    pub phone: Option<String>,
    pub party_size: u32,
    pub seating_preference: Option<String>,
}

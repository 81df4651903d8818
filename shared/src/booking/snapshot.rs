//! Booking snapshot - state folded from the booking event stream

use super::types::{BookingNote, BookingSource, BookingStatus, Deposit, GuestInfo};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Booking snapshot - computed from event stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BookingSnapshot {
    /// Booking ID (empty until the first event is applied)
    pub booking_id: String,
    pub org: String,
    pub site: String,
    pub confirmation_code: String,
    pub guest: GuestInfo,
    pub party_size: u32,
    /// Venue-local date and time of the reservation
    pub time: NaiveDateTime,
    /// Explicit duration; `None` means the settings resolve it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub source: BookingSource,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub notes: Vec<BookingNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<Deposit>,

    // ========== Lifecycle timestamps ==========
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrived_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_show_at: Option<i64>,

    /// Number of applied events
    pub version: u64,
}

impl BookingSnapshot {
    /// Whether a `Requested` event has been applied
    pub fn is_created(&self) -> bool {
        !self.booking_id.is_empty()
    }

    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }
}

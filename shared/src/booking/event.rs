//! Booking events - immutable facts recorded after command processing
//!
//! Events carry only what replay needs; derived values (status flags,
//! covers, cutoffs) are recomputed by the appliers.

use super::types::{BookingSource, GuestInfo};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Booking event payloads (closed set)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    // ========== Lifecycle ==========
    Requested {
        booking_id: String,
        org: String,
        site: String,
        confirmation_code: String,
        guest: GuestInfo,
        party_size: u32,
        time: NaiveDateTime,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_minutes: Option<u32>,
        source: BookingSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        special_requests: Option<String>,
        at: i64,
    },

    Confirmed {
        at: i64,
    },

    Modified {
        #[serde(skip_serializing_if = "Option::is_none")]
        party_size: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<NaiveDateTime>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_minutes: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        special_requests: Option<String>,
        at: i64,
    },

    Cancelled {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cancelled_by: Option<String>,
        at: i64,
    },

    // ========== Floor ==========
    TableAssigned {
        table_id: String,
        table_number: String,
        at: i64,
    },

    GuestArrived {
        at: i64,
    },

    GuestSeated {
        table_id: String,
        table_number: String,
        at: i64,
    },

    GuestDeparted {
        at: i64,
    },

    MarkedNoShow {
        at: i64,
    },

    // ========== Other ==========
    NoteAdded {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        at: i64,
    },

    // ========== Deposit ==========
    DepositRequired {
        amount: Decimal,
        at: i64,
    },

    DepositPaid {
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_reference: Option<String>,
        at: i64,
    },

    DepositForfeited {
        at: i64,
    },

    DepositRefunded {
        at: i64,
    },
}

impl BookingEvent {
    /// Stable event name for logs and audit trails
    pub const fn name(&self) -> &'static str {
        match self {
            BookingEvent::Requested { .. } => "BOOKING_REQUESTED",
            BookingEvent::Confirmed { .. } => "BOOKING_CONFIRMED",
            BookingEvent::Modified { .. } => "BOOKING_MODIFIED",
            BookingEvent::Cancelled { .. } => "BOOKING_CANCELLED",
            BookingEvent::TableAssigned { .. } => "TABLE_ASSIGNED",
            BookingEvent::GuestArrived { .. } => "GUEST_ARRIVED",
            BookingEvent::GuestSeated { .. } => "GUEST_SEATED",
            BookingEvent::GuestDeparted { .. } => "GUEST_DEPARTED",
            BookingEvent::MarkedNoShow { .. } => "MARKED_NO_SHOW",
            BookingEvent::NoteAdded { .. } => "NOTE_ADDED",
            BookingEvent::DepositRequired { .. } => "DEPOSIT_REQUIRED",
            BookingEvent::DepositPaid { .. } => "DEPOSIT_PAID",
            BookingEvent::DepositForfeited { .. } => "DEPOSIT_FORFEITED",
            BookingEvent::DepositRefunded { .. } => "DEPOSIT_REFUNDED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = BookingEvent::Confirmed { at: 42 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"CONFIRMED","at":42}"#);
        let back: BookingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}

//! Booking command handlers
//!
//! Each action validates against the current snapshot and returns the
//! events to raise. Nothing here touches storage: the entity appends the
//! events and folds them only after the append succeeds.

use crate::runtime::{EntityError, EntityResult};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::booking::{
    BookingEvent, BookingSnapshot, BookingSource, BookingStatus, DepositStatus, GuestInfo,
};

pub const MAX_PARTY_SIZE: u32 = 100;
pub const MAX_NOTE_LEN: usize = 2000;

/// Identity fields taken from the entity key, not from the caller
pub struct CommandMetadata<'a> {
    pub booking_id: &'a str,
    pub org: &'a str,
    pub site: &'a str,
    pub now: i64,
}

pub trait CommandHandler {
    /// Whether this command creates the booking (skips the existence guard)
    fn creates(&self) -> bool {
        false
    }

    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>>;
}

fn invalid_status(action: &str, status: BookingStatus) -> EntityError {
    EntityError::invalid_transition(format!("cannot {action} a booking in status {status:?}"))
}

fn validate_party_size(party_size: u32) -> EntityResult<()> {
    if party_size == 0 || party_size > MAX_PARTY_SIZE {
        return Err(EntityError::validation(format!(
            "party_size must be within 1..={MAX_PARTY_SIZE}"
        )));
    }
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBooking {
    pub guest: GuestInfo,
    pub party_size: u32,
    pub time: NaiveDateTime,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub source: BookingSource,
    #[serde(default)]
    pub special_requests: Option<String>,
    /// Pre-generated code; generated when absent
    #[serde(default)]
    pub confirmation_code: Option<String>,
}

impl CommandHandler for RequestBooking {
    fn creates(&self) -> bool {
        true
    }

    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        // Idempotent: a second request for the same id is a no-op
        if snapshot.is_created() {
            return Ok(Vec::new());
        }
        if self.guest.name.trim().is_empty() {
            return Err(EntityError::validation("guest name is required"));
        }
        validate_party_size(self.party_size)?;
        if self.duration_minutes == Some(0) {
            return Err(EntityError::validation("duration_minutes must be positive"));
        }

        Ok(vec![BookingEvent::Requested {
            booking_id: metadata.booking_id.to_string(),
            org: metadata.org.to_string(),
            site: metadata.site.to_string(),
            confirmation_code: self
                .confirmation_code
                .clone()
                .unwrap_or_else(shared::util::confirmation_code),
            guest: self.guest.clone(),
            party_size: self.party_size,
            time: self.time,
            duration_minutes: self.duration_minutes,
            source: self.source,
            special_requests: self.special_requests.clone().filter(|s| !s.is_empty()),
            at: metadata.now,
        }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmBooking;

impl CommandHandler for ConfirmBooking {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        if snapshot.status != BookingStatus::Requested {
            return Err(invalid_status("confirm", snapshot.status));
        }
        Ok(vec![BookingEvent::Confirmed { at: metadata.now }])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifyBooking {
    pub party_size: Option<u32>,
    pub time: Option<NaiveDateTime>,
    pub duration_minutes: Option<u32>,
    /// Empty string clears
    pub special_requests: Option<String>,
}

impl ModifyBooking {
    fn is_empty(&self) -> bool {
        self.party_size.is_none()
            && self.time.is_none()
            && self.duration_minutes.is_none()
            && self.special_requests.is_none()
    }
}

impl CommandHandler for ModifyBooking {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        if !snapshot.status.is_awaiting_arrival() {
            return Err(invalid_status("modify", snapshot.status));
        }
        if self.is_empty() {
            return Err(EntityError::validation("nothing to modify"));
        }
        if let Some(party_size) = self.party_size {
            validate_party_size(party_size)?;
        }
        if self.duration_minutes == Some(0) {
            return Err(EntityError::validation("duration_minutes must be positive"));
        }
        Ok(vec![BookingEvent::Modified {
            party_size: self.party_size,
            time: self.time,
            duration_minutes: self.duration_minutes,
            special_requests: self.special_requests.clone(),
            at: metadata.now,
        }])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelBooking {
    pub reason: Option<String>,
    pub cancelled_by: Option<String>,
}

impl CommandHandler for CancelBooking {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        match snapshot.status {
            BookingStatus::Requested | BookingStatus::Confirmed | BookingStatus::Arrived => {}
            status => return Err(invalid_status("cancel", status)),
        }
        Ok(vec![BookingEvent::Cancelled {
            reason: self.reason.clone(),
            cancelled_by: self.cancelled_by.clone(),
            at: metadata.now,
        }])
    }
}

// ============================================================================
// Floor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTable {
    pub table_id: String,
    pub table_number: String,
}

impl CommandHandler for AssignTable {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        match snapshot.status {
            BookingStatus::Requested | BookingStatus::Confirmed | BookingStatus::Arrived => {}
            status => return Err(invalid_status("assign a table to", status)),
        }
        if self.table_id.is_empty() {
            return Err(EntityError::validation("table_id is required"));
        }
        Ok(vec![BookingEvent::TableAssigned {
            table_id: self.table_id.clone(),
            table_number: self.table_number.clone(),
            at: metadata.now,
        }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordArrival;

impl CommandHandler for RecordArrival {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        if !snapshot.status.is_awaiting_arrival() {
            return Err(invalid_status("record arrival for", snapshot.status));
        }
        Ok(vec![BookingEvent::GuestArrived { at: metadata.now }])
    }
}

/// Seat at `table_id`; falls back to the assigned table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatGuest {
    pub table_id: Option<String>,
    pub table_number: Option<String>,
}

impl CommandHandler for SeatGuest {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        match snapshot.status {
            BookingStatus::Requested | BookingStatus::Confirmed | BookingStatus::Arrived => {}
            status => return Err(invalid_status("seat", status)),
        }
        let (table_id, table_number) = match (&self.table_id, &snapshot.table_id) {
            (Some(id), _) => (
                id.clone(),
                self.table_number.clone().unwrap_or_else(|| id.clone()),
            ),
            (None, Some(assigned)) => (
                assigned.clone(),
                snapshot.table_number.clone().unwrap_or_else(|| assigned.clone()),
            ),
            (None, None) => {
                return Err(EntityError::validation(
                    "no table given and none assigned to the booking",
                ));
            }
        };
        Ok(vec![BookingEvent::GuestSeated {
            table_id,
            table_number,
            at: metadata.now,
        }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordDeparture;

impl CommandHandler for RecordDeparture {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        if snapshot.status != BookingStatus::Seated {
            return Err(invalid_status("record departure for", snapshot.status));
        }
        Ok(vec![BookingEvent::GuestDeparted { at: metadata.now }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkNoShow;

impl CommandHandler for MarkNoShow {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        if !snapshot.status.is_awaiting_arrival() {
            return Err(invalid_status("mark as no-show", snapshot.status));
        }
        Ok(vec![BookingEvent::MarkedNoShow { at: metadata.now }])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNote {
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
}

impl CommandHandler for AddNote {
    fn execute(
        &self,
        _snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(EntityError::validation("note text is required"));
        }
        if text.len() > MAX_NOTE_LEN {
            return Err(EntityError::validation(format!(
                "note exceeds {MAX_NOTE_LEN} bytes"
            )));
        }
        Ok(vec![BookingEvent::NoteAdded {
            text: text.to_string(),
            author: self.author.clone(),
            at: metadata.now,
        }])
    }
}

// ============================================================================
// Deposit
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequireDeposit {
    pub amount: Decimal,
}

impl CommandHandler for RequireDeposit {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        if snapshot.status.is_terminal() {
            return Err(invalid_status("require a deposit for", snapshot.status));
        }
        if self.amount <= Decimal::ZERO {
            return Err(EntityError::validation("deposit amount must be positive"));
        }
        if let Some(deposit) = &snapshot.deposit
            && deposit.status != DepositStatus::Refunded
        {
            return Err(EntityError::AlreadyExists(format!(
                "deposit for booking {}",
                snapshot.booking_id
            )));
        }
        Ok(vec![BookingEvent::DepositRequired {
            amount: self.amount,
            at: metadata.now,
        }])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayDeposit {
    pub payment_reference: Option<String>,
}

impl CommandHandler for PayDeposit {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        require_deposit_status(snapshot, DepositStatus::Required, "pay")?;
        Ok(vec![BookingEvent::DepositPaid {
            payment_reference: self.payment_reference.clone(),
            at: metadata.now,
        }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForfeitDeposit;

impl CommandHandler for ForfeitDeposit {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        require_deposit_status(snapshot, DepositStatus::Paid, "forfeit")?;
        Ok(vec![BookingEvent::DepositForfeited { at: metadata.now }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefundDeposit;

impl CommandHandler for RefundDeposit {
    fn execute(
        &self,
        snapshot: &BookingSnapshot,
        metadata: &CommandMetadata<'_>,
    ) -> EntityResult<Vec<BookingEvent>> {
        require_deposit_status(snapshot, DepositStatus::Paid, "refund")?;
        Ok(vec![BookingEvent::DepositRefunded { at: metadata.now }])
    }
}

fn require_deposit_status(
    snapshot: &BookingSnapshot,
    expected: DepositStatus,
    action: &str,
) -> EntityResult<()> {
    match &snapshot.deposit {
        None => Err(EntityError::not_found(format!(
            "deposit for booking {}",
            snapshot.booking_id
        ))),
        Some(d) if d.status != expected => Err(EntityError::invalid_transition(format!(
            "cannot {action} a deposit in status {:?}",
            d.status
        ))),
        Some(_) => Ok(()),
    }
}

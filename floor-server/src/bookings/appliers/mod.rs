//! Booking event appliers
//!
//! Each applier handles one event variant and is a pure function of
//! `(snapshot, event)`. [`BookingSnapshot`]'s `Aggregate::transition`
//! resolves the applier, runs it, then bumps the version.

use enum_dispatch::enum_dispatch;

use crate::runtime::Aggregate;
use shared::booking::{BookingEvent, BookingSnapshot};

mod deposit;
mod floor;
mod lifecycle;
mod note;

pub use deposit::{
    DepositForfeitedApplier, DepositPaidApplier, DepositRefundedApplier, DepositRequiredApplier,
};
pub use floor::{
    GuestArrivedApplier, GuestDepartedApplier, GuestSeatedApplier, MarkedNoShowApplier,
    TableAssignedApplier,
};
pub use lifecycle::{CancelledApplier, ConfirmedApplier, ModifiedApplier, RequestedApplier};
pub use note::NoteAddedApplier;

/// Folds one event into the booking snapshot
#[enum_dispatch]
pub trait EventApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent);
}

/// EventAction enum - dispatches to concrete applier implementations
#[enum_dispatch(EventApplier)]
pub enum EventAction {
    Requested(RequestedApplier),
    Confirmed(ConfirmedApplier),
    Modified(ModifiedApplier),
    Cancelled(CancelledApplier),
    TableAssigned(TableAssignedApplier),
    GuestArrived(GuestArrivedApplier),
    GuestSeated(GuestSeatedApplier),
    GuestDeparted(GuestDepartedApplier),
    MarkedNoShow(MarkedNoShowApplier),
    NoteAdded(NoteAddedApplier),
    DepositRequired(DepositRequiredApplier),
    DepositPaid(DepositPaidApplier),
    DepositForfeited(DepositForfeitedApplier),
    DepositRefunded(DepositRefundedApplier),
}

/// This is the ONLY place with a match on BookingEvent.
impl From<&BookingEvent> for EventAction {
    fn from(event: &BookingEvent) -> Self {
        match event {
            BookingEvent::Requested { .. } => EventAction::Requested(RequestedApplier),
            BookingEvent::Confirmed { .. } => EventAction::Confirmed(ConfirmedApplier),
            BookingEvent::Modified { .. } => EventAction::Modified(ModifiedApplier),
            BookingEvent::Cancelled { .. } => EventAction::Cancelled(CancelledApplier),
            BookingEvent::TableAssigned { .. } => EventAction::TableAssigned(TableAssignedApplier),
            BookingEvent::GuestArrived { .. } => EventAction::GuestArrived(GuestArrivedApplier),
            BookingEvent::GuestSeated { .. } => EventAction::GuestSeated(GuestSeatedApplier),
            BookingEvent::GuestDeparted { .. } => EventAction::GuestDeparted(GuestDepartedApplier),
            BookingEvent::MarkedNoShow { .. } => EventAction::MarkedNoShow(MarkedNoShowApplier),
            BookingEvent::NoteAdded { .. } => EventAction::NoteAdded(NoteAddedApplier),
            BookingEvent::DepositRequired { .. } => {
                EventAction::DepositRequired(DepositRequiredApplier)
            }
            BookingEvent::DepositPaid { .. } => EventAction::DepositPaid(DepositPaidApplier),
            BookingEvent::DepositForfeited { .. } => {
                EventAction::DepositForfeited(DepositForfeitedApplier)
            }
            BookingEvent::DepositRefunded { .. } => {
                EventAction::DepositRefunded(DepositRefundedApplier)
            }
        }
    }
}

impl Aggregate for BookingSnapshot {
    type Event = BookingEvent;

    fn transition(&mut self, event: &BookingEvent) {
        EventAction::from(event).apply(self, event);
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use shared::booking::{BookingSource, BookingStatus, DepositStatus, GuestInfo};

    pub(crate) fn requested(at: i64) -> BookingEvent {
        BookingEvent::Requested {
            booking_id: "b-1".into(),
            org: "acme".into(),
            site: "s1".into(),
            confirmation_code: "ABC123".into(),
            guest: GuestInfo {
                name: "Ana".into(),
                ..Default::default()
            },
            party_size: 4,
            time: NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            duration_minutes: None,
            source: BookingSource::Website,
            special_requests: None,
            at,
        }
    }

    fn full_stream() -> Vec<BookingEvent> {
        vec![
            requested(1),
            BookingEvent::Confirmed { at: 2 },
            BookingEvent::DepositRequired {
                amount: Decimal::new(4000, 2),
                at: 3,
            },
            BookingEvent::DepositPaid {
                payment_reference: Some("pay-1".into()),
                at: 4,
            },
            BookingEvent::Modified {
                party_size: Some(5),
                time: None,
                duration_minutes: Some(120),
                special_requests: Some("window".into()),
                at: 5,
            },
            BookingEvent::TableAssigned {
                table_id: "t-7".into(),
                table_number: "7".into(),
                at: 6,
            },
            BookingEvent::GuestArrived { at: 7 },
            BookingEvent::GuestSeated {
                table_id: "t-7".into(),
                table_number: "7".into(),
                at: 8,
            },
            BookingEvent::NoteAdded {
                text: "birthday".into(),
                author: None,
                at: 9,
            },
            BookingEvent::GuestDeparted { at: 10 },
            BookingEvent::DepositRefunded { at: 11 },
        ]
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = full_stream();
        let a = BookingSnapshot::replay(&events);
        let b = BookingSnapshot::replay(&events);
        assert_eq!(a, b);
        assert_eq!(a.version, events.len() as u64);
        assert_eq!(a.status, BookingStatus::Completed);
        assert_eq!(a.party_size, 5);
        assert_eq!(a.duration_minutes, Some(120));
        assert_eq!(a.table_number.as_deref(), Some("7"));
        assert_eq!(a.deposit.as_ref().map(|d| d.status), Some(DepositStatus::Refunded));
        assert_eq!(a.updated_at, 11);
    }

    #[test]
    fn test_prefix_replay_matches_incremental_state() {
        let events = full_stream();
        let mut incremental = BookingSnapshot::default();
        for (i, event) in events.iter().enumerate() {
            incremental.transition(event);
            let replayed = BookingSnapshot::replay(&events[..=i]);
            assert_eq!(replayed, incremental);
        }
    }
}

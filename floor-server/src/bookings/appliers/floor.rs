//! Floor appliers: table assignment, arrival, seating, departure, no-show

use super::EventApplier;
use shared::booking::{BookingEvent, BookingSnapshot, BookingStatus};

pub struct TableAssignedApplier;

impl EventApplier for TableAssignedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::TableAssigned {
            table_id,
            table_number,
            at,
        } = event
        {
            snapshot.table_id = Some(table_id.clone());
            snapshot.table_number = Some(table_number.clone());
            snapshot.updated_at = *at;
        }
    }
}

pub struct GuestArrivedApplier;

impl EventApplier for GuestArrivedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::GuestArrived { at } = event {
            snapshot.status = BookingStatus::Arrived;
            snapshot.arrived_at = Some(*at);
            snapshot.updated_at = *at;
        }
    }
}

/// Seating a walk-in straight from `Requested` also stamps the arrival
pub struct GuestSeatedApplier;

impl EventApplier for GuestSeatedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::GuestSeated {
            table_id,
            table_number,
            at,
        } = event
        {
            snapshot.status = BookingStatus::Seated;
            snapshot.table_id = Some(table_id.clone());
            snapshot.table_number = Some(table_number.clone());
            snapshot.arrived_at.get_or_insert(*at);
            snapshot.seated_at = Some(*at);
            snapshot.updated_at = *at;
        }
    }
}

pub struct GuestDepartedApplier;

impl EventApplier for GuestDepartedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::GuestDeparted { at } = event {
            snapshot.status = BookingStatus::Completed;
            snapshot.departed_at = Some(*at);
            snapshot.updated_at = *at;
        }
    }
}

pub struct MarkedNoShowApplier;

impl EventApplier for MarkedNoShowApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::MarkedNoShow { at } = event {
            snapshot.status = BookingStatus::NoShow;
            snapshot.no_show_at = Some(*at);
            snapshot.updated_at = *at;
        }
    }
}

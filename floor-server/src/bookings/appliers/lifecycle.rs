//! Lifecycle appliers: requested, confirmed, modified, cancelled

use super::EventApplier;
use shared::booking::{BookingEvent, BookingSnapshot, BookingStatus};

pub struct RequestedApplier;

impl EventApplier for RequestedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::Requested {
            booking_id,
            org,
            site,
            confirmation_code,
            guest,
            party_size,
            time,
            duration_minutes,
            source,
            special_requests,
            at,
        } = event
        {
            snapshot.booking_id = booking_id.clone();
            snapshot.org = org.clone();
            snapshot.site = site.clone();
            snapshot.confirmation_code = confirmation_code.clone();
            snapshot.guest = guest.clone();
            snapshot.party_size = *party_size;
            snapshot.time = *time;
            snapshot.duration_minutes = *duration_minutes;
            snapshot.source = *source;
            snapshot.special_requests = special_requests.clone();
            snapshot.status = BookingStatus::Requested;
            snapshot.created_at = *at;
            snapshot.updated_at = *at;
        }
    }
}

pub struct ConfirmedApplier;

impl EventApplier for ConfirmedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::Confirmed { at } = event {
            snapshot.status = BookingStatus::Confirmed;
            snapshot.confirmed_at = Some(*at);
            snapshot.updated_at = *at;
        }
    }
}

/// Only fields present in the event change
pub struct ModifiedApplier;

impl EventApplier for ModifiedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::Modified {
            party_size,
            time,
            duration_minutes,
            special_requests,
            at,
        } = event
        {
            if let Some(v) = party_size {
                snapshot.party_size = *v;
            }
            if let Some(v) = time {
                snapshot.time = *v;
            }
            if let Some(v) = duration_minutes {
                snapshot.duration_minutes = Some(*v);
            }
            if let Some(v) = special_requests {
                snapshot.special_requests = if v.is_empty() { None } else { Some(v.clone()) };
            }
            snapshot.updated_at = *at;
        }
    }
}

pub struct CancelledApplier;

impl EventApplier for CancelledApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::Cancelled { reason, at, .. } = event {
            snapshot.status = BookingStatus::Cancelled;
            snapshot.cancelled_at = Some(*at);
            snapshot.cancellation_reason = reason.clone();
            snapshot.updated_at = *at;
        }
    }
}

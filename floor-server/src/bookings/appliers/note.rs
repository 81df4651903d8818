//! NoteAdded event applier
//!
//! Notes are append-only; the booking keeps every note in arrival order.

use super::EventApplier;
use shared::booking::{BookingEvent, BookingNote, BookingSnapshot};

pub struct NoteAddedApplier;

impl EventApplier for NoteAddedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::NoteAdded { text, author, at } = event {
            snapshot.notes.push(BookingNote {
                text: text.clone(),
                author: author.clone(),
                added_at: *at,
            });
            snapshot.updated_at = *at;
        }
    }
}

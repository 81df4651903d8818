//! Booking domain types
//!
//! - [`event`]: booking events (event-sourced)
//! - [`snapshot`]: state folded from those events
//! - [`settings`]: per-site booking rules
//! - [`calendar`]: per-day booking references
//! - [`availability`]: slot query / result

pub mod availability;
pub mod calendar;
pub mod event;
pub mod settings;
pub mod snapshot;
pub mod types;

pub use availability::{AvailabilityRequest, AvailabilityResult, SlotAvailability, UnavailableReason};
pub use calendar::{BookingReference, CalendarSnapshot, ReferenceUpdate};
pub use event::BookingEvent;
pub use settings::{
    BookingSettings, BookingSettingsUpdate, ChannelQuota, DepositPolicy, MealPeriod, PacingRule,
};
pub use snapshot::BookingSnapshot;
pub use types::{
    BookingNote, BookingSource, BookingStatus, Deposit, DepositStatus, GuestInfo,
};

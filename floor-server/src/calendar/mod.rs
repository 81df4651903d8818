//! Booking settings, per-day calendars and the availability engine

pub mod availability;
pub mod calendar;
pub mod settings;

pub use calendar::{BookingCalendar, CalendarHandle};
pub use settings::{BookingSettingsEntity, SettingsHandle};

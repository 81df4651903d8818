//! Bookings
//!
//! - [`entity`]: event-sourced booking lifecycle ([`Booking`], [`BookingHandle`])
//! - [`actions`]: command validation producing booking events
//! - [`appliers`]: pure event appliers folding events into the snapshot
//! - [`no_show`]: per-site no-show detection driven by durable reminders

pub mod actions;
pub mod appliers;
pub mod entity;
pub mod no_show;

pub use entity::{Booking, BookingHandle};
pub use no_show::{NoShowDetector, NoShowHandle, NoShowOutcome, NoShowRecord};

//! Availability query and result types

use super::types::BookingSource;
use crate::floor::TableRecommendation;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AvailabilityRequest {
    pub party_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub source: BookingSource,
    /// Venue-local "now"; defaults to the runtime clock
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seating_preference: Option<String>,
    #[serde(default)]
    pub is_vip: bool,
}

/// First rule that made a slot unavailable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnavailableReason {
    DateBlocked,
    PartyTooLarge,
    PastLastSeating,
    LeadTime,
    ChannelQuota,
    WalkInHoldback,
    Capacity,
    Pacing,
    NoTables,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    pub time: NaiveTime,
    pub available: bool,
    /// 0 whenever `available` is false
    pub available_capacity: u32,
    #[serde(default)]
    pub suggestions: Vec<TableRecommendation>,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
}

impl SlotAvailability {
    pub fn unavailable(time: NaiveTime, duration_minutes: u32, reason: UnavailableReason) -> Self {
        Self {
            time,
            available: false,
            available_capacity: 0,
            suggestions: Vec::new(),
            duration_minutes,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityResult {
    pub date: NaiveDate,
    pub party_size: u32,
    pub slots: Vec<SlotAvailability>,
}

impl AvailabilityResult {
    pub fn slot(&self, time: NaiveTime) -> Option<&SlotAvailability> {
        self.slots.iter().find(|s| s.time == time)
    }

    pub fn available_times(&self) -> Vec<NaiveTime> {
        self.slots
            .iter()
            .filter(|s| s.available)
            .map(|s| s.time)
            .collect()
    }
}

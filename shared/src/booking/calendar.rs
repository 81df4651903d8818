//! Per-day booking calendar

use super::types::{BookingSource, BookingStatus};
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Calendar line for one booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingReference {
    pub booking_id: String,
    pub confirmation_code: String,
    pub time: NaiveTime,
    pub party_size: u32,
    pub guest_name: String,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<BookingSource>,
}

impl BookingReference {
    /// Seating interval `[start, start + minutes)` intersects this booking's
    /// `[time, time + duration + turnover)`
    pub fn overlaps(&self, start: NaiveTime, minutes: u32, duration: u32, turnover: u32) -> bool {
        let own_start = minute_of_day(self.time);
        let own_end = own_start + (self.duration_minutes.unwrap_or(duration) + turnover) as i64;
        let other_start = minute_of_day(start);
        let other_end = other_start + minutes as i64;
        own_start < other_end && other_start < own_end
    }
}

fn minute_of_day(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}

/// 日历快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CalendarSnapshot {
    pub org: String,
    pub site: String,
    pub date: NaiveDate,
    /// Ordered by time, then insertion
    pub references: Vec<BookingReference>,
    /// Always equals the sum of `party_size` over `references`
    pub total_covers: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CalendarSnapshot {
    pub fn find(&self, booking_id: &str) -> Option<&BookingReference> {
        self.references.iter().find(|r| r.booking_id == booking_id)
    }

    /// References still holding capacity
    pub fn active(&self) -> impl Iterator<Item = &BookingReference> {
        self.references.iter().filter(|r| r.status.holds_capacity())
    }
}

/// Partial reference update (None = unchanged)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceUpdate {
    pub time: Option<NaiveTime>,
    pub party_size: Option<u32>,
    pub status: Option<BookingStatus>,
    pub guest_name: Option<String>,
    /// `Some(None)` clears the table
    pub table: Option<Option<(String, String)>>,
    pub duration_minutes: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(h: u32, m: u32, duration: Option<u32>) -> BookingReference {
        BookingReference {
            booking_id: "b".into(),
            confirmation_code: "C".into(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            party_size: 2,
            guest_name: "g".into(),
            status: BookingStatus::Confirmed,
            table_id: None,
            table_number: None,
            duration_minutes: duration,
            source: None,
        }
    }

    #[test]
    fn test_occupancy_is_half_open() {
        let r = reference(12, 0, Some(60));
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(r.overlaps(at(12, 0), 1, 90, 15));
        assert!(r.overlaps(at(13, 14), 1, 90, 15));
        assert!(!r.overlaps(at(13, 15), 1, 90, 15));
        assert!(!r.overlaps(at(11, 59), 1, 90, 15));
    }

    #[test]
    fn test_interval_overlap() {
        let r = reference(12, 10, Some(60));
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        // [12:10, 13:25)
        assert!(r.overlaps(at(12, 5), 105, 90, 15));
        assert!(r.overlaps(at(13, 24), 105, 90, 15));
        assert!(!r.overlaps(at(13, 25), 105, 90, 15));
        assert!(!r.overlaps(at(10, 25), 105, 90, 15));
    }

    #[test]
    fn test_occupancy_falls_back_to_default_duration() {
        let r = reference(12, 0, None);
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(r.overlaps(at(13, 40), 1, 90, 15));
        assert!(!r.overlaps(at(13, 45), 1, 90, 15));
    }
}

//! Per-site booking settings
//!
//! Meal periods refine the site-level values (duration, last seating) but
//! never widen them: a slot outside any period, or a period that leaves a
//! value unset, falls back to the site default.

use super::types::BookingSource;
use chrono::{Duration, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Named service window (lunch, dinner, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealPeriod {
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seating_offset_minutes: Option<u32>,
}

impl MealPeriod {
    /// Half-open `[start, end)`
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }

    /// `end - last_seating_offset`, when the period defines an offset
    pub fn last_seating(&self) -> Option<NaiveTime> {
        self.last_seating_offset_minutes
            .map(|m| self.end - Duration::minutes(m as i64))
    }
}

/// Per-channel daily cover cap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelQuota {
    pub source: BookingSource,
    pub max_covers_per_day: u32,
}

/// Limit on covers startable within a forward window of slots
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacingRule {
    pub window_slots: u32,
    pub max_covers_per_interval: u32,
}

/// Parties at or above `min_party_size` pay `amount_per_cover` up front
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DepositPolicy {
    pub min_party_size: u32,
    pub amount_per_cover: Decimal,
}

/// 预订设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSettings {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub default_duration_minutes: u32,
    pub slot_interval_minutes: u32,
    pub turnover_buffer_minutes: u32,
    pub max_party_size_online: u32,
    pub max_bookings_per_slot: u32,
    #[serde(default)]
    pub blocked_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub meal_periods: Vec<MealPeriod>,
    #[serde(default)]
    pub channel_quotas: Vec<ChannelQuota>,
    #[serde(default)]
    pub walk_in_holdback_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingRule>,
    #[serde(default)]
    pub min_lead_time_hours: u32,
    #[serde(default)]
    pub last_seating_offset_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_policy: Option<DepositPolicy>,
    #[serde(default)]
    pub updated_at: i64,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            open_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN),
            close_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            default_duration_minutes: 90,
            slot_interval_minutes: 15,
            turnover_buffer_minutes: 15,
            max_party_size_online: 8,
            max_bookings_per_slot: 4,
            blocked_dates: Vec::new(),
            meal_periods: Vec::new(),
            channel_quotas: Vec::new(),
            walk_in_holdback_percent: 0,
            pacing: None,
            min_lead_time_hours: 0,
            last_seating_offset_minutes: 0,
            deposit_policy: None,
            updated_at: 0,
        }
    }
}

impl BookingSettings {
    /// Check internal consistency; returns a human readable reason on failure
    pub fn validate(&self) -> Result<(), String> {
        if self.close_time <= self.open_time {
            return Err("close_time must be after open_time".into());
        }
        if self.slot_interval_minutes == 0 {
            return Err("slot_interval_minutes must be positive".into());
        }
        if self.default_duration_minutes == 0 {
            return Err("default_duration_minutes must be positive".into());
        }
        if self.max_party_size_online == 0 {
            return Err("max_party_size_online must be positive".into());
        }
        if self.walk_in_holdback_percent > 100 {
            return Err("walk_in_holdback_percent must be within 0..=100".into());
        }
        for period in &self.meal_periods {
            if period.end <= period.start {
                return Err(format!("meal period '{}' ends before it starts", period.name));
            }
            if period.start < self.open_time || period.end > self.close_time {
                return Err(format!(
                    "meal period '{}' lies outside operating hours",
                    period.name
                ));
            }
            if period.default_duration_minutes == Some(0) {
                return Err(format!("meal period '{}' has a zero duration", period.name));
            }
        }
        if let Some(pacing) = &self.pacing
            && pacing.window_slots == 0
        {
            return Err("pacing.window_slots must be positive".into());
        }
        Ok(())
    }

    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.blocked_dates.contains(&date)
    }

    /// First meal period containing `time`
    pub fn period_for(&self, time: NaiveTime) -> Option<&MealPeriod> {
        self.meal_periods.iter().find(|p| p.contains(time))
    }

    /// Requested duration > meal period default > site default
    pub fn duration_for(&self, time: NaiveTime, requested: Option<u32>) -> u32 {
        requested
            .filter(|m| *m > 0)
            .or_else(|| self.period_for(time).and_then(|p| p.default_duration_minutes))
            .unwrap_or(self.default_duration_minutes)
    }

    /// Latest start time for a slot at `time`
    pub fn last_seating_for(&self, time: NaiveTime) -> NaiveTime {
        let site = self.close_time - Duration::minutes(self.last_seating_offset_minutes as i64);
        match self.period_for(time).and_then(|p| p.last_seating()) {
            Some(period) if period < site => period,
            _ => site,
        }
    }

    pub fn quota_for(&self, source: BookingSource) -> Option<&ChannelQuota> {
        self.channel_quotas.iter().find(|q| q.source == source)
    }

    /// Slot grid `[open, close)` in `slot_interval` steps
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(self.slot_interval_minutes.max(1) as i64);
        let mut slots = Vec::new();
        let mut t = self.open_time;
        while t < self.close_time {
            slots.push(t);
            let next = t + step;
            // NaiveTime wraps at midnight
            if next <= t {
                break;
            }
            t = next;
        }
        slots
    }

    /// Deposit amount owed by a party, if the policy applies
    pub fn deposit_for(&self, party_size: u32) -> Option<Decimal> {
        self.deposit_policy
            .filter(|p| party_size >= p.min_party_size)
            .map(|p| p.amount_per_cover * Decimal::from(party_size))
    }
}

/// Partial settings update (None = unchanged)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingSettingsUpdate {
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    pub default_duration_minutes: Option<u32>,
    pub slot_interval_minutes: Option<u32>,
    pub turnover_buffer_minutes: Option<u32>,
    pub max_party_size_online: Option<u32>,
    pub max_bookings_per_slot: Option<u32>,
    pub meal_periods: Option<Vec<MealPeriod>>,
    pub channel_quotas: Option<Vec<ChannelQuota>>,
    pub walk_in_holdback_percent: Option<u32>,
    /// `Some(None)` removes pacing
    pub pacing: Option<Option<PacingRule>>,
    pub min_lead_time_hours: Option<u32>,
    pub last_seating_offset_minutes: Option<u32>,
    /// `Some(None)` removes the deposit policy
    pub deposit_policy: Option<Option<DepositPolicy>>,
}

impl BookingSettingsUpdate {
    pub fn apply_to(self, settings: &mut BookingSettings) {
        if let Some(v) = self.open_time {
            settings.open_time = v;
        }
        if let Some(v) = self.close_time {
            settings.close_time = v;
        }
        if let Some(v) = self.default_duration_minutes {
            settings.default_duration_minutes = v;
        }
        if let Some(v) = self.slot_interval_minutes {
            settings.slot_interval_minutes = v;
        }
        if let Some(v) = self.turnover_buffer_minutes {
            settings.turnover_buffer_minutes = v;
        }
        if let Some(v) = self.max_party_size_online {
            settings.max_party_size_online = v;
        }
        if let Some(v) = self.max_bookings_per_slot {
            settings.max_bookings_per_slot = v;
        }
        if let Some(v) = self.meal_periods {
            settings.meal_periods = v;
        }
        if let Some(v) = self.channel_quotas {
            settings.channel_quotas = v;
        }
        if let Some(v) = self.walk_in_holdback_percent {
            settings.walk_in_holdback_percent = v;
        }
        if let Some(v) = self.pacing {
            settings.pacing = v;
        }
        if let Some(v) = self.min_lead_time_hours {
            settings.min_lead_time_hours = v;
        }
        if let Some(v) = self.last_seating_offset_minutes {
            settings.last_seating_offset_minutes = v;
        }
        if let Some(v) = self.deposit_policy {
            settings.deposit_policy = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn with_dinner() -> BookingSettings {
        BookingSettings {
            meal_periods: vec![MealPeriod {
                name: "dinner".into(),
                start: t(17, 0),
                end: t(21, 0),
                default_duration_minutes: Some(120),
                last_seating_offset_minutes: Some(60),
            }],
            last_seating_offset_minutes: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_duration_precedence() {
        let s = with_dinner();
        assert_eq!(s.duration_for(t(12, 0), None), 90);
        assert_eq!(s.duration_for(t(18, 0), None), 120);
        assert_eq!(s.duration_for(t(18, 0), Some(45)), 45);
    }

    #[test]
    fn test_last_seating_tightened_by_period() {
        let s = with_dinner();
        // site cutoff 21:30, dinner cutoff 20:00
        assert_eq!(s.last_seating_for(t(12, 0)), t(21, 30));
        assert_eq!(s.last_seating_for(t(18, 0)), t(20, 0));
    }

    #[test]
    fn test_slot_grid() {
        let s = BookingSettings::default();
        let slots = s.slot_times();
        assert_eq!(slots.first(), Some(&t(11, 0)));
        assert_eq!(slots.last(), Some(&t(21, 45)));
        assert_eq!(slots.len(), 44);
    }

    #[test]
    fn test_validate_rejects_period_outside_hours() {
        let mut s = with_dinner();
        s.meal_periods[0].end = t(23, 0);
        assert!(s.validate().is_err());
        assert!(with_dinner().validate().is_ok());
    }

    #[test]
    fn test_deposit_policy() {
        let s = BookingSettings {
            deposit_policy: Some(DepositPolicy {
                min_party_size: 6,
                amount_per_cover: Decimal::new(1000, 2),
            }),
            ..Default::default()
        };
        assert_eq!(s.deposit_for(4), None);
        assert_eq!(s.deposit_for(6), Some(Decimal::new(6000, 2)));
    }
}

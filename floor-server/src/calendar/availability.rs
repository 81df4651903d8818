//! Availability engine
//!
//! Pure read-side computation: settings + the day's calendar + an optional
//! optimizer snapshot in, one [`SlotAvailability`] per candidate slot out.
//! Nothing passed in is mutated.
//!
//! Per slot, in order:
//!
//! | Step | Rule | Staff sources |
//! |------|------|---------------|
//! | 1 | blocked date / party above online max (whole day) | applies |
//! | 2 | duration: request > meal period > site | applies |
//! | 3 | last seating cutoff | applies |
//! | 4 | minimum lead time | skipped |
//! | 5 | channel quota | skipped |
//! | 6 | walk-in holdback | skipped |
//! | 7 | bookings per slot | applies |
//! | 8 | pacing window | applies |
//! | 9 | free tables (optimizer) | applies |
//!
//! Steps 7–9 are evaluated independently and ANDed. Steps 7 and 9 count a
//! booking when its occupied interval `[time, time + duration + turnover)`
//! covers the slot, i.e. intersects the slot's own grid cell
//! `[slot, slot + interval)`.

use crate::floor::optimizer::scoring;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use shared::booking::{
    AvailabilityRequest, AvailabilityResult, BookingReference, BookingSettings, CalendarSnapshot,
    SlotAvailability, UnavailableReason,
};
use shared::floor::{AssignmentRequest, OptimizerSnapshot, TableRecommendation};

/// Everything one availability query reads
pub struct AvailabilityInput<'a> {
    pub settings: &'a BookingSettings,
    pub calendar: &'a CalendarSnapshot,
    /// `None` (no optimizer for the site) skips the table rule
    pub optimizer: Option<&'a OptimizerSnapshot>,
    pub request: &'a AvailabilityRequest,
    /// Venue-local current time
    pub now: NaiveDateTime,
}

/// Candidate slot times: the grid plus an off-grid preferred time
fn candidate_times(settings: &BookingSettings, preferred: Option<NaiveTime>) -> Vec<NaiveTime> {
    let mut times = settings.slot_times();
    if let Some(p) = preferred
        && p >= settings.open_time
        && p < settings.close_time
        && !times.contains(&p)
    {
        let at = times.partition_point(|t| *t < p);
        times.insert(at, p);
    }
    times
}

struct DayTotals {
    /// Active bookings for the day
    bookings: u32,
    /// Active covers attributed to the requesting channel
    channel_covers: u32,
}

fn day_totals(input: &AvailabilityInput<'_>) -> DayTotals {
    let source = input.request.source;
    let mut totals = DayTotals {
        bookings: 0,
        channel_covers: 0,
    };
    for r in input.calendar.active() {
        totals.bookings += 1;
        if r.source.unwrap_or_default() == source {
            totals.channel_covers += r.party_size;
        }
    }
    totals
}

/// Online-only rules (steps 3–6); `None` means the slot passes
fn gate(
    input: &AvailabilityInput<'_>,
    totals: &DayTotals,
    slot: NaiveTime,
    slots_in_day: u32,
) -> Option<UnavailableReason> {
    let settings = input.settings;
    if slot >= settings.last_seating_for(slot) {
        return Some(UnavailableReason::PastLastSeating);
    }
    if input.request.source.is_staff() {
        return None;
    }

    let slot_at = input.calendar.date.and_time(slot);
    if slot_at - input.now < Duration::hours(settings.min_lead_time_hours as i64) {
        return Some(UnavailableReason::LeadTime);
    }
    if let Some(quota) = settings.quota_for(input.request.source)
        && totals.channel_covers >= quota.max_covers_per_day
    {
        return Some(UnavailableReason::ChannelQuota);
    }
    let day_capacity = settings.max_bookings_per_slot as u64 * slots_in_day as u64;
    let bookable = day_capacity * (100 - settings.walk_in_holdback_percent.min(100)) as u64 / 100;
    if totals.bookings as u64 >= bookable {
        return Some(UnavailableReason::WalkInHoldback);
    }
    None
}

/// Active references whose occupied interval covers `slot`
fn covering<'a>(
    input: &AvailabilityInput<'a>,
    slot: NaiveTime,
) -> impl Iterator<Item = &'a BookingReference> {
    let settings = input.settings;
    let calendar = input.calendar;
    let cell = settings.slot_interval_minutes.max(1);
    calendar.active().filter(move |r| {
        r.overlaps(
            slot,
            cell,
            settings.default_duration_minutes,
            settings.turnover_buffer_minutes,
        )
    })
}

/// Step 9: recommendations with the slot's booked tables marked occupied
fn table_suggestions(
    input: &AvailabilityInput<'_>,
    optimizer: &OptimizerSnapshot,
    slot: NaiveTime,
    duration: u32,
) -> Vec<TableRecommendation> {
    let busy: Vec<&str> = covering(input, slot)
        .filter_map(|r| r.table_id.as_deref())
        .collect();

    let mut at_slot = optimizer.clone();
    for table in &mut at_slot.tables {
        table.is_occupied = busy.contains(&table.table_id.as_str());
    }
    let request = AssignmentRequest {
        party_size: input.request.party_size,
        time: Some(slot),
        duration_minutes: Some(duration),
        seating_preference: input.request.seating_preference.clone(),
        is_vip: input.request.is_vip,
        preferred_server_id: None,
        preferred_table_id: None,
    };
    scoring::recommend(&at_slot, &request).recommendations
}

fn evaluate_slot(
    input: &AvailabilityInput<'_>,
    totals: &DayTotals,
    slot: NaiveTime,
    slots_in_day: u32,
) -> SlotAvailability {
    let settings = input.settings;
    let request = input.request;
    let duration = settings.duration_for(slot, request.duration_minutes);

    if let Some(reason) = gate(input, totals, slot, slots_in_day) {
        return SlotAvailability::unavailable(slot, duration, reason);
    }

    // Step 7
    let overlapping = covering(input, slot).count() as u32;
    let capacity_ok = overlapping < settings.max_bookings_per_slot;

    // Step 8
    let pacing_ok = match settings.pacing {
        Some(rule) => {
            let window = (rule.window_slots * settings.slot_interval_minutes) as i64;
            let window_end = slot + Duration::minutes(window);
            let wraps = window_end <= slot;
            let covers: u32 = input
                .calendar
                .active()
                .filter(|r| r.time >= slot && (wraps || r.time < window_end))
                .map(|r| r.party_size)
                .sum();
            covers + request.party_size <= rule.max_covers_per_interval
        }
        None => true,
    };

    // Step 9
    let (tables_ok, suggestions) = match input.optimizer {
        Some(optimizer) => {
            let suggestions = table_suggestions(input, optimizer, slot, duration);
            (!suggestions.is_empty(), suggestions)
        }
        None => (true, Vec::new()),
    };

    let reason = if !capacity_ok {
        Some(UnavailableReason::Capacity)
    } else if !pacing_ok {
        Some(UnavailableReason::Pacing)
    } else if !tables_ok {
        Some(UnavailableReason::NoTables)
    } else {
        None
    };
    if let Some(reason) = reason {
        return SlotAvailability::unavailable(slot, duration, reason);
    }

    let available_capacity = if input.optimizer.is_some() {
        suggestions.len() as u32
    } else {
        settings.max_bookings_per_slot - overlapping
    };
    SlotAvailability {
        time: slot,
        available: true,
        available_capacity,
        suggestions,
        duration_minutes: duration,
        reason: None,
    }
}

/// Evaluate every candidate slot of the calendar's date
pub fn compute(input: &AvailabilityInput<'_>) -> AvailabilityResult {
    let settings = input.settings;
    let request = input.request;
    let date = input.calendar.date;
    let times = candidate_times(settings, request.preferred_time);

    let day_reason = if settings.is_blocked(date) {
        Some(UnavailableReason::DateBlocked)
    } else if request.party_size > settings.max_party_size_online {
        Some(UnavailableReason::PartyTooLarge)
    } else {
        None
    };

    let slots = match day_reason {
        Some(reason) => times
            .into_iter()
            .map(|t| {
                SlotAvailability::unavailable(
                    t,
                    settings.duration_for(t, request.duration_minutes),
                    reason,
                )
            })
            .collect(),
        None => {
            let totals = day_totals(input);
            let slots_in_day = settings.slot_times().len() as u32;
            times
                .into_iter()
                .map(|t| evaluate_slot(input, &totals, t, slots_in_day))
                .collect()
        }
    };

    AvailabilityResult {
        date,
        party_size: request.party_size,
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::booking::{BookingSource, BookingStatus, ChannelQuota, MealPeriod, PacingRule};
    use shared::floor::OptimizableTable;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn reference(id: &str, time: NaiveTime, party: u32) -> BookingReference {
        BookingReference {
            booking_id: id.into(),
            confirmation_code: "ABC123".into(),
            time,
            party_size: party,
            guest_name: "guest".into(),
            status: BookingStatus::Confirmed,
            table_id: None,
            table_number: None,
            duration_minutes: None,
            source: Some(BookingSource::Website),
        }
    }

    fn calendar(references: Vec<BookingReference>) -> CalendarSnapshot {
        CalendarSnapshot {
            total_covers: references.iter().map(|r| r.party_size).sum(),
            references,
            date: date(),
            ..Default::default()
        }
    }

    fn scenario_settings() -> BookingSettings {
        BookingSettings {
            open_time: t(11, 0),
            close_time: t(22, 0),
            slot_interval_minutes: 15,
            max_bookings_per_slot: 2,
            default_duration_minutes: 90,
            turnover_buffer_minutes: 15,
            ..Default::default()
        }
    }

    fn request(party: u32) -> AvailabilityRequest {
        AvailabilityRequest {
            party_size: party,
            source: BookingSource::Phone,
            ..Default::default()
        }
    }

    fn run(
        settings: &BookingSettings,
        cal: &CalendarSnapshot,
        optimizer: Option<&OptimizerSnapshot>,
        req: &AvailabilityRequest,
    ) -> AvailabilityResult {
        compute(&AvailabilityInput {
            settings,
            calendar: cal,
            optimizer,
            request: req,
            now: date().and_time(t(8, 0)),
        })
    }

    #[test]
    fn test_lunch_rush_scenario() {
        let settings = scenario_settings();
        let mut a = reference("a", t(12, 0), 4);
        a.duration_minutes = Some(60);
        let mut b = reference("b", t(12, 10), 4);
        b.duration_minutes = Some(60);
        let cal = calendar(vec![a, b]);
        let req = AvailabilityRequest {
            preferred_time: Some(t(12, 5)),
            ..request(2)
        };

        let result = run(&settings, &cal, None, &req);
        let at_1205 = result.slot(t(12, 5)).unwrap();
        assert!(!at_1205.available);
        assert_eq!(at_1205.available_capacity, 0);
        assert_eq!(at_1205.reason, Some(UnavailableReason::Capacity));
        assert!(!result.slot(t(12, 0)).unwrap().available);
        assert!(!result.slot(t(13, 0)).unwrap().available);

        let at_1330 = result.slot(t(13, 30)).unwrap();
        assert!(at_1330.available);
        assert_eq!(at_1330.available_capacity, 2);
        assert_eq!(at_1330.duration_minutes, 90);

        // Nothing covers the morning even though a 90 minute seating at
        // 11:00 would still be at the table at 12:00
        for m in [0, 15, 30, 45] {
            let slot = result.slot(t(11, m)).unwrap();
            assert!(slot.available, "11:{m:02}");
            assert_eq!(slot.available_capacity, 2, "11:{m:02}");
        }
        // Only the 12:10 booking is still seated at 13:15
        assert_eq!(result.slot(t(13, 15)).unwrap().available_capacity, 1);
    }

    #[test]
    fn test_default_duration_bookings_cover_until_turnover_ends() {
        let settings = scenario_settings();
        // [12:00, 13:45) and [12:10, 13:55)
        let cal = calendar(vec![reference("a", t(12, 0), 4), reference("b", t(12, 10), 4)]);
        let req = AvailabilityRequest {
            preferred_time: Some(t(12, 5)),
            ..request(2)
        };
        let result = run(&settings, &cal, None, &req);

        for m in [0, 15, 30, 45] {
            assert!(result.slot(t(11, m)).unwrap().available, "11:{m:02}");
        }
        assert_eq!(
            result.slot(t(12, 5)).unwrap().reason,
            Some(UnavailableReason::Capacity)
        );
        assert!(!result.slot(t(13, 30)).unwrap().available);
        assert_eq!(result.slot(t(13, 45)).unwrap().available_capacity, 1);
        assert_eq!(result.slot(t(14, 0)).unwrap().available_capacity, 2);
    }

    #[test]
    fn test_blocked_date_closes_whole_day() {
        let mut settings = scenario_settings();
        settings.blocked_dates.push(date());
        settings.max_bookings_per_slot = 100;
        let result = run(&settings, &calendar(vec![]), None, &request(2));
        assert!(!result.slots.is_empty());
        assert!(result.slots.iter().all(|s| !s.available
            && s.available_capacity == 0
            && s.reason == Some(UnavailableReason::DateBlocked)));
    }

    #[test]
    fn test_party_above_online_max() {
        let settings = scenario_settings();
        let result = run(&settings, &calendar(vec![]), None, &request(9));
        assert!(result.available_times().is_empty());
    }

    #[test]
    fn test_more_slot_capacity_never_closes_a_slot() {
        let cal = calendar(vec![
            reference("a", t(12, 0), 2),
            reference("b", t(12, 0), 2),
            reference("c", t(18, 30), 6),
        ]);
        let mut previous: Option<AvailabilityResult> = None;
        for max in 1..6 {
            let settings = BookingSettings {
                max_bookings_per_slot: max,
                ..scenario_settings()
            };
            let result = run(&settings, &cal, None, &request(2));
            if let Some(prev) = &previous {
                for slot in &prev.slots {
                    if slot.available {
                        assert!(result.slot(slot.time).unwrap().available);
                    }
                }
            }
            previous = Some(result);
        }
    }

    #[test]
    fn test_last_seating_and_meal_period_duration() {
        let settings = BookingSettings {
            last_seating_offset_minutes: 60,
            meal_periods: vec![MealPeriod {
                name: "lunch".into(),
                start: t(12, 0),
                end: t(15, 0),
                default_duration_minutes: Some(60),
                last_seating_offset_minutes: Some(30),
            }],
            ..scenario_settings()
        };
        let result = run(&settings, &calendar(vec![]), None, &request(2));
        assert_eq!(result.slot(t(12, 0)).unwrap().duration_minutes, 60);
        assert_eq!(result.slot(t(11, 0)).unwrap().duration_minutes, 90);
        assert_eq!(
            result.slot(t(14, 30)).unwrap().reason,
            Some(UnavailableReason::PastLastSeating)
        );
        assert!(result.slot(t(15, 0)).unwrap().available);
        assert!(result.slot(t(20, 45)).unwrap().available);
        assert!(!result.slot(t(21, 0)).unwrap().available);
    }

    #[test]
    fn test_online_rules_skip_staff() {
        let settings = BookingSettings {
            min_lead_time_hours: 4,
            channel_quotas: vec![ChannelQuota {
                source: BookingSource::Website,
                max_covers_per_day: 4,
            }],
            max_bookings_per_slot: 10,
            ..scenario_settings()
        };
        let cal = calendar(vec![reference("a", t(19, 0), 4)]);

        let online = AvailabilityRequest {
            source: BookingSource::Website,
            ..request(2)
        };
        let result = run(&settings, &cal, None, &online);
        assert_eq!(
            result.slot(t(11, 0)).unwrap().reason,
            Some(UnavailableReason::LeadTime)
        );
        assert_eq!(
            result.slot(t(13, 0)).unwrap().reason,
            Some(UnavailableReason::ChannelQuota)
        );

        // Another channel has its own quota budget
        let app = AvailabilityRequest {
            source: BookingSource::MobileApp,
            ..request(2)
        };
        assert!(run(&settings, &cal, None, &app).slot(t(13, 0)).unwrap().available);

        let staff = run(&settings, &cal, None, &request(2));
        assert!(staff.slot(t(11, 0)).unwrap().available);
    }

    #[test]
    fn test_walk_in_holdback() {
        let settings = BookingSettings {
            open_time: t(18, 0),
            close_time: t(19, 0),
            max_bookings_per_slot: 1,
            walk_in_holdback_percent: 50,
            ..scenario_settings()
        };
        // 4 slots × 1 booking, half held back: 2 bookable
        let cal = calendar(vec![reference("a", t(18, 0), 2), reference("b", t(18, 15), 2)]);
        let online = AvailabilityRequest {
            source: BookingSource::Website,
            ..request(2)
        };
        let result = run(&settings, &cal, None, &online);
        assert!(result.slots.iter().all(|s| s.reason == Some(UnavailableReason::WalkInHoldback)));
    }

    #[test]
    fn test_pacing_window() {
        let settings = BookingSettings {
            pacing: Some(PacingRule {
                window_slots: 2,
                max_covers_per_interval: 8,
            }),
            max_bookings_per_slot: 10,
            ..scenario_settings()
        };
        let cal = calendar(vec![reference("a", t(19, 15), 6)]);
        let result = run(&settings, &cal, None, &request(4));
        // 19:00 window [19:00, 19:30) holds 6 covers
        assert_eq!(
            result.slot(t(19, 0)).unwrap().reason,
            Some(UnavailableReason::Pacing)
        );
        // 18:45 window [18:45, 19:15) is empty
        assert!(result.slot(t(18, 45)).unwrap().available);
        assert!(run(&settings, &cal, None, &request(2)).slot(t(19, 0)).unwrap().available);
    }

    #[test]
    fn test_table_rule_uses_booked_tables() {
        let settings = BookingSettings {
            max_bookings_per_slot: 10,
            ..scenario_settings()
        };
        let optimizer = OptimizerSnapshot {
            tables: vec![
                OptimizableTable::new("t1", "1", 1, 4),
                OptimizableTable::new("t2", "2", 1, 4),
            ],
            ..Default::default()
        };
        let mut a = reference("a", t(19, 0), 2);
        a.table_id = Some("t1".into());
        let mut b = reference("b", t(19, 0), 2);
        b.table_id = Some("t2".into());

        let one_taken = calendar(vec![a.clone()]);
        let result = run(&settings, &one_taken, Some(&optimizer), &request(2));
        let slot = result.slot(t(19, 0)).unwrap();
        assert!(slot.available);
        assert_eq!(slot.available_capacity, 1);
        assert_eq!(slot.suggestions[0].table_ids, vec!["t2".to_string()]);
        assert_eq!(result.slot(t(12, 0)).unwrap().available_capacity, 2);

        let both_taken = calendar(vec![a, b]);
        let result = run(&settings, &both_taken, Some(&optimizer), &request(2));
        assert_eq!(
            result.slot(t(19, 0)).unwrap().reason,
            Some(UnavailableReason::NoTables)
        );
    }

    #[test]
    fn test_cancelled_references_free_capacity() {
        let settings = scenario_settings();
        let mut a = reference("a", t(12, 0), 2);
        a.status = BookingStatus::Cancelled;
        let cal = calendar(vec![a, reference("b", t(12, 0), 2)]);
        assert!(run(&settings, &cal, None, &request(2)).slot(t(12, 0)).unwrap().available);
    }
}

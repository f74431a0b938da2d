//! Tests for bookable slot generation.

use booking_engine::availability::{
    AvailabilityTemplate, AvailabilityWindow, Period, ScheduleConfig, DAY_MS,
};
use booking_engine::expander::{expand_events, EventKind, EventRecord, Frequency, RecurrenceRule};
use booking_engine::slots::{generate_slots, group_by_day, Slot};
use booking_engine::BookingError;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

const MINUTE_MS: i64 = 60_000;

fn utc(month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, hour, min, 0).unwrap()
}

fn schedule(zone: &str, minutes: i64, template: AvailabilityTemplate) -> ScheduleConfig {
    ScheduleConfig {
        time_zone: zone.to_string(),
        meeting_duration_ms: minutes * MINUTE_MS,
        meeting_interval_ms: 0,
        availability: template,
    }
}

/// UTC, Monday 09:00-17:00, 30-minute meetings.
fn monday_nine_to_five() -> ScheduleConfig {
    schedule(
        "UTC",
        30,
        AvailabilityTemplate::new().with_day(Weekday::Mon, vec![AvailabilityWindow::hours(9, 0, 17, 0)]),
    )
}

/// Monday 2026-03-16, midnight to midnight UTC.
fn monday_period() -> Period {
    Period::new(utc(3, 16, 0, 0), utc(3, 17, 0, 0)).unwrap()
}

fn long_ago() -> DateTime<Utc> {
    utc(1, 1, 0, 0)
}

fn starts(slots: &[Slot]) -> Vec<DateTime<Utc>> {
    slots.iter().map(|s| s.start).collect()
}

fn local_hm(slots: &[Slot], tz: &Tz) -> Vec<(u32, u32)> {
    slots
        .iter()
        .map(|s| {
            let local = s.start.with_timezone(tz);
            (local.hour(), local.minute())
        })
        .collect()
}

// ── Scenario A: empty calendar ──────────────────────────────────────────────

#[test]
fn free_monday_yields_sixteen_contiguous_slots() {
    let slots = generate_slots(&monday_nine_to_five(), &[], &monday_period(), long_ago()).unwrap();

    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0].start, utc(3, 16, 9, 0));
    assert_eq!(slots[15].end, utc(3, 16, 17, 0));
    for pair in slots.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "slots should be contiguous");
    }
    for slot in &slots {
        assert_eq!(slot.end - slot.start, Duration::minutes(30));
    }
}

// ── Scenario B: one busy event ──────────────────────────────────────────────

#[test]
fn busy_event_removes_only_the_overlapping_slot() {
    let records = vec![EventRecord::single("meeting", utc(3, 16, 10, 0), utc(3, 16, 10, 30))];
    let period = monday_period();
    let occurrences = expand_events(&records, period.start, period.end).occurrences;

    let slots = generate_slots(&monday_nine_to_five(), &occurrences, &period, long_ago()).unwrap();
    let starts = starts(&slots);

    assert_eq!(slots.len(), 15);
    assert!(starts.contains(&utc(3, 16, 9, 30)), "touching slot before stays free");
    assert!(!starts.contains(&utc(3, 16, 10, 0)), "overlapping slot is removed");
    assert!(starts.contains(&utc(3, 16, 10, 30)), "touching slot after stays free");
}

// ── Scenario C: all-day event ───────────────────────────────────────────────

#[test]
fn all_day_event_blanks_the_day() {
    let records = vec![EventRecord {
        all_day: true,
        time_zone: Some("UTC".to_string()),
        ..EventRecord::single("holiday", utc(3, 16, 13, 17), utc(3, 16, 13, 17))
    }];
    let period = monday_period();
    let occurrences = expand_events(&records, period.start, period.end).occurrences;

    let slots = generate_slots(&monday_nine_to_five(), &occurrences, &period, long_ago()).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn all_day_event_without_zone_uses_schedule_local_day() {
    // New York is UTC-4 on 2026-03-16; local midnight is 04:00 UTC.
    let ny: Tz = "America/New_York".parse().unwrap();
    let template = AvailabilityTemplate::new()
        .with_day(Weekday::Mon, vec![AvailabilityWindow::hours(9, 0, 17, 0)])
        .with_day(Weekday::Tue, vec![AvailabilityWindow::hours(9, 0, 17, 0)]);
    let config = schedule("America/New_York", 30, template);
    let period = Period::new(utc(3, 16, 4, 0), utc(3, 18, 4, 0)).unwrap();
    let records = vec![EventRecord {
        all_day: true,
        ..EventRecord::single("pto", utc(3, 16, 4, 0), utc(3, 16, 4, 0))
    }];
    let occurrences = expand_events(&records, period.start, period.end).occurrences;

    let slots = generate_slots(&config, &occurrences, &period, long_ago()).unwrap();

    assert_eq!(slots.len(), 16, "only Tuesday remains");
    assert!(slots
        .iter()
        .all(|s| s.start.with_timezone(&ny).weekday() == Weekday::Tue));
    assert_eq!(slots[0].start, utc(3, 17, 13, 0));
}

// ── Scenario D: not-before cut-off ──────────────────────────────────────────

#[test]
fn slots_before_not_before_are_dropped() {
    let slots = generate_slots(&monday_nine_to_five(), &[], &monday_period(), utc(3, 16, 9, 45)).unwrap();

    assert_eq!(slots.len(), 14);
    assert_eq!(slots[0].start, utc(3, 16, 10, 0));
}

// ── Scenario E: recurring event, DST between anchor and query ───────────────

#[test]
fn weekly_recurring_event_blocks_same_local_hour_after_dst() {
    let ny: Tz = "America/New_York".parse().unwrap();
    let config = schedule(
        "America/New_York",
        60,
        AvailabilityTemplate::new().with_day(Weekday::Mon, vec![AvailabilityWindow::hours(9, 0, 12, 0)]),
    );
    // Anchored Monday 2026-03-02 10:00 EST, before the 2026-03-08 switch.
    let records = vec![EventRecord {
        time_zone: Some("America/New_York".to_string()),
        kind: EventKind::Recurring {
            rule: RecurrenceRule::new(Frequency::Weekly),
        },
        ..EventRecord::single("sync", utc(3, 2, 15, 0), utc(3, 2, 16, 0))
    }];
    let period = Period::new(utc(3, 16, 4, 0), utc(3, 17, 4, 0)).unwrap();
    let occurrences = expand_events(&records, period.start, period.end).occurrences;

    let slots = generate_slots(&config, &occurrences, &period, long_ago()).unwrap();

    assert_eq!(local_hm(&slots, &ny), vec![(9, 0), (11, 0)]);
    assert_eq!(starts(&slots), vec![utc(3, 16, 13, 0), utc(3, 16, 15, 0)]);
}

// ── Interval and multiple windows ───────────────────────────────────────────

#[test]
fn interval_spaces_slot_starts() {
    let mut config = monday_nine_to_five();
    config.meeting_interval_ms = 15 * MINUTE_MS;
    config.availability =
        AvailabilityTemplate::new().with_day(Weekday::Mon, vec![AvailabilityWindow::hours(9, 0, 11, 0)]);

    let slots = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap();

    // 09:00, 09:45, 10:30 (10:30 + 30 = 11:00 still fits).
    assert_eq!(
        starts(&slots),
        vec![utc(3, 16, 9, 0), utc(3, 16, 9, 45), utc(3, 16, 10, 30)]
    );
}

#[test]
fn every_window_of_the_day_is_used_in_order() {
    let mut config = monday_nine_to_five();
    config.meeting_duration_ms = 60 * MINUTE_MS;
    config.availability = AvailabilityTemplate::new().with_day(
        Weekday::Mon,
        vec![
            AvailabilityWindow::hours(14, 0, 16, 0),
            AvailabilityWindow::hours(9, 0, 10, 30),
        ],
    );

    let slots = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap();
    assert_eq!(
        starts(&slots),
        vec![utc(3, 16, 9, 0), utc(3, 16, 14, 0), utc(3, 16, 15, 0)]
    );
}

#[test]
fn days_without_windows_are_skipped_across_a_week() {
    let period = Period::new(utc(3, 15, 0, 0), utc(3, 22, 0, 0)).unwrap();
    let slots = generate_slots(&monday_nine_to_five(), &[], &period, long_ago()).unwrap();

    assert_eq!(slots.len(), 16);
    assert!(slots.iter().all(|s| s.start.weekday() == Weekday::Mon));
}

#[test]
fn empty_template_gives_empty_result() {
    let config = schedule("UTC", 30, AvailabilityTemplate::new());
    let slots = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap();
    assert!(slots.is_empty());
}

// ── DST transition days ─────────────────────────────────────────────────────

#[test]
fn spring_forward_skips_the_missing_hour() {
    // 2026-03-08: New York jumps from 02:00 EST to 03:00 EDT.
    let ny: Tz = "America/New_York".parse().unwrap();
    let config = schedule(
        "America/New_York",
        60,
        AvailabilityTemplate::new().with_day(Weekday::Sun, vec![AvailabilityWindow::hours(0, 0, 5, 0)]),
    );
    let period = Period::new(utc(3, 8, 5, 0), utc(3, 9, 4, 0)).unwrap();

    let slots = generate_slots(&config, &[], &period, long_ago()).unwrap();

    assert_eq!(local_hm(&slots, &ny), vec![(0, 0), (1, 0), (3, 0), (4, 0)]);
    assert_eq!(
        starts(&slots),
        vec![utc(3, 8, 5, 0), utc(3, 8, 6, 0), utc(3, 8, 7, 0), utc(3, 8, 8, 0)]
    );
}

#[test]
fn business_hours_on_spring_forward_day_use_the_new_offset() {
    let config = schedule(
        "America/New_York",
        30,
        AvailabilityTemplate::new()
            .with_day(Weekday::Sat, vec![AvailabilityWindow::hours(9, 0, 10, 0)])
            .with_day(Weekday::Sun, vec![AvailabilityWindow::hours(9, 0, 10, 0)])
            .with_day(Weekday::Mon, vec![AvailabilityWindow::hours(9, 0, 10, 0)]),
    );
    // Saturday 2026-03-07 00:00 EST through Tuesday 2026-03-10 00:00 EDT.
    let period = Period::new(utc(3, 7, 5, 0), utc(3, 10, 4, 0)).unwrap();

    let slots = generate_slots(&config, &[], &period, long_ago()).unwrap();

    assert_eq!(
        starts(&slots),
        vec![
            utc(3, 7, 14, 0),
            utc(3, 7, 14, 30),
            utc(3, 8, 13, 0),
            utc(3, 8, 13, 30),
            utc(3, 9, 13, 0),
            utc(3, 9, 13, 30),
        ]
    );
}

#[test]
fn fall_back_does_not_duplicate_the_repeated_hour() {
    // 2026-11-01: New York falls back from 02:00 EDT to 01:00 EST.
    let config = schedule(
        "America/New_York",
        30,
        AvailabilityTemplate::new().with_day(Weekday::Sun, vec![AvailabilityWindow::hours(0, 0, 4, 0)]),
    );
    let period = Period::new(utc(11, 1, 4, 0), utc(11, 2, 5, 0)).unwrap();

    let slots = generate_slots(&config, &[], &period, long_ago()).unwrap();

    assert_eq!(
        starts(&slots),
        vec![
            utc(11, 1, 4, 0),
            utc(11, 1, 4, 30),
            utc(11, 1, 5, 0),
            utc(11, 1, 5, 30),
            utc(11, 1, 7, 0),
            utc(11, 1, 7, 30),
            utc(11, 1, 8, 0),
            utc(11, 1, 8, 30),
        ]
    );
}

#[test]
fn slots_spanning_a_transition_are_rejected() {
    let fall = schedule(
        "America/New_York",
        90,
        AvailabilityTemplate::new().with_day(Weekday::Sun, vec![AvailabilityWindow::hours(1, 0, 2, 30)]),
    );
    let period = Period::new(utc(11, 1, 4, 0), utc(11, 2, 5, 0)).unwrap();
    assert!(generate_slots(&fall, &[], &period, long_ago()).unwrap().is_empty());

    let spring = schedule(
        "America/New_York",
        60,
        AvailabilityTemplate::new().with_day(Weekday::Sun, vec![AvailabilityWindow::hours(1, 30, 3, 30)]),
    );
    let period = Period::new(utc(3, 8, 5, 0), utc(3, 9, 4, 0)).unwrap();
    assert!(generate_slots(&spring, &[], &period, long_ago()).unwrap().is_empty());
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[test]
fn unknown_schedule_zone_aborts() {
    let mut config = monday_nine_to_five();
    config.time_zone = "Europe/Atlantis".to_string();

    let err = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap_err();
    assert_eq!(err, BookingError::InvalidTimezone("Europe/Atlantis".to_string()));
}

#[test]
fn zero_duration_aborts() {
    let mut config = monday_nine_to_five();
    config.meeting_duration_ms = 0;

    let err = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap_err();
    assert!(matches!(err, BookingError::InvalidScheduleConfig(_)));
}

#[test]
fn oversized_duration_or_interval_is_an_error() {
    for (duration, interval) in [(i64::MAX, 0), (30 * MINUTE_MS, i64::MAX)] {
        let mut config = monday_nine_to_five();
        config.meeting_duration_ms = duration;
        config.meeting_interval_ms = interval;

        let err = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidScheduleConfig(_)));
    }
}

#[test]
fn whole_day_meeting_with_whole_day_interval() {
    let mut config = monday_nine_to_five();
    config.meeting_duration_ms = DAY_MS;
    config.meeting_interval_ms = DAY_MS;
    config.availability = AvailabilityTemplate::new().with_day(
        Weekday::Mon,
        vec![AvailabilityWindow { start: 0, end: DAY_MS }],
    );

    let slots = generate_slots(&config, &[], &monday_period(), long_ago()).unwrap();
    assert_eq!(slots, vec![Slot { start: utc(3, 16, 0, 0), end: utc(3, 17, 0, 0) }]);
}

#[test]
fn inverted_period_aborts() {
    let period = Period {
        start: utc(3, 17, 0, 0),
        end: utc(3, 16, 0, 0),
    };
    let err = generate_slots(&monday_nine_to_five(), &[], &period, long_ago()).unwrap_err();
    assert!(matches!(err, BookingError::InvalidPeriod(_)));
}

// ── Grouping ────────────────────────────────────────────────────────────────

#[test]
fn group_by_day_uses_the_given_zone() {
    let slots = vec![
        Slot {
            start: utc(3, 16, 23, 0),
            end: utc(3, 16, 23, 30),
        },
        Slot {
            start: utc(3, 17, 1, 0),
            end: utc(3, 17, 1, 30),
        },
    ];

    let by_utc_day = group_by_day(&slots, &chrono_tz::UTC);
    assert_eq!(by_utc_day.len(), 2);

    // Both fall on 2026-03-16 in Los Angeles (UTC-7).
    let la: Tz = "America/Los_Angeles".parse().unwrap();
    let by_la_day = group_by_day(&slots, &la);
    assert_eq!(by_la_day.len(), 1);
    let (date, day_slots) = by_la_day.iter().next().unwrap();
    assert_eq!(date.to_string(), "2026-03-16");
    assert_eq!(day_slots.len(), 2);
}

#[test]
fn slots_serialize_as_epoch_milliseconds() {
    let slot = Slot {
        start: utc(3, 16, 9, 0),
        end: utc(3, 16, 9, 30),
    };
    let json = serde_json::to_string(&slot).unwrap();
    assert_eq!(json, r#"{"start":1773651600000,"end":1773653400000}"#);
}

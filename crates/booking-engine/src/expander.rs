//! Event expansion -- turns raw calendar records into concrete occurrences.
//!
//! Single events pass through when they can touch the query window. Recurring
//! definitions are expanded with the `rrule` crate, DTSTART expressed in the
//! event's own zone so the wall-clock time is held across DST, and then
//! exceptions, additions and per-instance overrides are applied on top.
//!
//! A recurring definition that cannot be expanded is skipped on its own; the
//! rest of the calendar is still expanded.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, Duration, Utc, Weekday};
use chrono_tz::Tz;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::offset::parse_timezone;

/// Upper bound on base instances produced for one series in one call.
pub const MAX_SERIES_INSTANCES: u16 = 10_000;

/// How often a recurring event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_rrule(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

/// A change to one occurrence of a series, keyed by its original start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Override {
    Cancelled,
    Moved {
        #[serde(with = "ts_milliseconds")]
        start: DateTime<Utc>,
        #[serde(with = "ts_milliseconds")]
        end: DateTime<Utc>,
    },
}

/// Recurrence descriptor of a recurring event definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub by_day: Vec<Weekday>,
    /// Occurrence starts removed from the series (EXDATE).
    #[serde(default, with = "crate::millis::set")]
    pub exceptions: BTreeSet<DateTime<Utc>>,
    /// Extra occurrence starts (RDATE), each lasting the base event's duration.
    #[serde(default, with = "crate::millis::set")]
    pub additions: BTreeSet<DateTime<Utc>>,
    #[serde(default, with = "crate::millis::map")]
    pub overrides: BTreeMap<DateTime<Utc>, Override>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    /// A rule repeating every period of `frequency`, forever.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            exceptions: BTreeSet::new(),
            additions: BTreeSet::new(),
            overrides: BTreeMap::new(),
        }
    }
}

/// What a raw record is: a plain event, a series, or a detached instance of a series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    #[default]
    Single,
    Recurring { rule: RecurrenceRule },
    /// A modified or cancelled occurrence stored as its own record.
    #[serde(rename_all = "camelCase")]
    Instance {
        recurring_event_id: String,
        #[serde(with = "ts_milliseconds")]
        original_start: DateTime<Utc>,
        #[serde(default)]
        cancelled: bool,
    },
}

/// A raw calendar record as supplied by the calendar store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: String,
    #[serde(rename = "date", with = "ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(rename = "dueDate", with = "ts_milliseconds")]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub participants: BTreeSet<String>,
    #[serde(default)]
    pub kind: EventKind,
}

impl EventRecord {
    /// A single, timed event with no participants.
    pub fn single(event_id: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            event_id: event_id.into(),
            start,
            end,
            all_day: false,
            time_zone: None,
            participants: BTreeSet::new(),
            kind: EventKind::Single,
        }
    }
}

/// One concrete, time-bounded occurrence of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub event_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub time_zone: Option<Tz>,
}

/// Result of expanding a batch of records.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Occurrences that can touch the window, sorted by start.
    pub occurrences: Vec<Occurrence>,
    /// One [`BookingError::MalformedRecurrenceRule`] per skipped series.
    pub skipped: Vec<BookingError>,
}

/// Expand `records` into occurrences that can touch `[window_start, window_end]`.
///
/// Occurrences are kept when they start no later than `window_end` and end after
/// `window_start - 1 day`; the extra day catches all-day events whose local day
/// begins before the window in UTC terms.
pub fn expand_events(
    records: &[EventRecord],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Expansion {
    expand_events_for(records, window_start, window_end, &BTreeSet::new())
}

/// Like [`expand_events`], keeping only records whose participants intersect
/// `participants`. An empty filter keeps every record.
pub fn expand_events_for(
    records: &[EventRecord],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    participants: &BTreeSet<String>,
) -> Expansion {
    let lower = window_start - Duration::days(1);
    let wanted =
        |r: &EventRecord| participants.is_empty() || !r.participants.is_disjoint(participants);

    let series_ids: HashSet<&str> = records
        .iter()
        .filter(|r| matches!(r.kind, EventKind::Recurring { .. }))
        .map(|r| r.event_id.as_str())
        .collect();

    // Detached instances become overrides of their series.
    let mut detached: HashMap<&str, BTreeMap<DateTime<Utc>, Override>> = HashMap::new();
    for record in records {
        if let EventKind::Instance {
            recurring_event_id,
            original_start,
            cancelled,
        } = &record.kind
        {
            if series_ids.contains(recurring_event_id.as_str()) {
                let change = if *cancelled {
                    Override::Cancelled
                } else {
                    Override::Moved {
                        start: record.start,
                        end: record.end,
                    }
                };
                detached
                    .entry(recurring_event_id.as_str())
                    .or_default()
                    .insert(*original_start, change);
            }
        }
    }

    let mut expansion = Expansion::default();
    for record in records.iter().filter(|r| wanted(r)) {
        match &record.kind {
            EventKind::Single => expansion.occurrences.push(occurrence_of(record)),
            EventKind::Instance {
                recurring_event_id,
                cancelled,
                ..
            } => {
                // Orphaned instances stand on their own.
                if !*cancelled && !series_ids.contains(recurring_event_id.as_str()) {
                    expansion.occurrences.push(occurrence_of(record));
                }
            }
            EventKind::Recurring { rule } => {
                let extra = detached.get(record.event_id.as_str());
                match expand_series(record, rule, extra, lower, window_end) {
                    Ok(occurrences) => expansion.occurrences.extend(occurrences),
                    Err(e) => {
                        tracing::warn!(
                            event_id = %record.event_id,
                            error = %e,
                            "skipping recurring event with malformed rule"
                        );
                        expansion.skipped.push(e);
                    }
                }
            }
        }
    }

    expansion
        .occurrences
        .retain(|o| o.start <= window_end && o.end > lower);
    expansion.occurrences.sort_by_key(|o| (o.start, o.end));

    tracing::debug!(
        records = records.len(),
        occurrences = expansion.occurrences.len(),
        skipped = expansion.skipped.len(),
        "expanded calendar events"
    );
    expansion
}

/// Zone of a record, if it names one chrono-tz knows.
fn record_zone(record: &EventRecord) -> Option<Tz> {
    let id = record.time_zone.as_deref()?;
    match parse_timezone(id) {
        Ok(tz) => Some(tz),
        Err(e) => {
            tracing::warn!(event_id = %record.event_id, error = %e, "ignoring unknown event timezone");
            None
        }
    }
}

fn occurrence_of(record: &EventRecord) -> Occurrence {
    Occurrence {
        event_id: record.event_id.clone(),
        start: record.start,
        end: record.end,
        all_day: record.all_day,
        time_zone: record_zone(record),
    }
}

/// Expand one series into occurrences starting no later than `upper`.
fn expand_series(
    record: &EventRecord,
    rule: &RecurrenceRule,
    detached: Option<&BTreeMap<DateTime<Utc>, Override>>,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
) -> Result<Vec<Occurrence>> {
    let malformed = |reason: String| BookingError::MalformedRecurrenceRule {
        event_id: record.event_id.clone(),
        reason,
    };

    if rule.interval == 0 {
        return Err(malformed("interval must be at least 1".to_string()));
    }
    if rule.count == Some(0) {
        return Err(malformed("count must be at least 1".to_string()));
    }
    if rule.until.is_some_and(|until| until < record.start) {
        return Err(malformed("until precedes the first occurrence".to_string()));
    }
    let duration = record.end - record.start;
    if duration < Duration::zero() {
        return Err(malformed("event ends before it starts".to_string()));
    }
    let tz = match record.time_zone.as_deref() {
        Some(id) => parse_timezone(id).map_err(|e| malformed(e.to_string()))?,
        None => chrono_tz::UTC,
    };

    let rrule_set: RRuleSet = rrule_text(record, rule, &tz)
        .parse()
        .map_err(|e: rrule::RRuleError| malformed(e.to_string()))?;

    // Anything starting before this cannot reach the buffered window.
    let after = lower - duration;
    let result = rrule_set
        .after(after.with_timezone(&rrule::Tz::UTC))
        .before(upper.with_timezone(&rrule::Tz::UTC))
        .all(MAX_SERIES_INSTANCES);
    if result.limited {
        tracing::warn!(
            event_id = %record.event_id,
            limit = MAX_SERIES_INSTANCES,
            "recurring event expansion truncated"
        );
    }

    let mut overrides = rule.overrides.clone();
    if let Some(extra) = detached {
        overrides.extend(extra.iter().map(|(k, v)| (*k, *v)));
    }

    let mut starts: BTreeSet<DateTime<Utc>> = result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .collect();
    starts.extend(rule.additions.iter().copied());

    let zone = record_zone(record);
    let make = |start: DateTime<Utc>, end: DateTime<Utc>| Occurrence {
        event_id: record.event_id.clone(),
        start,
        end,
        all_day: record.all_day,
        time_zone: zone,
    };

    let mut occurrences = Vec::new();
    for start in &starts {
        if rule.exceptions.contains(start) {
            continue;
        }
        match overrides.get(start) {
            Some(Override::Cancelled) => {}
            Some(Override::Moved { start, end }) => occurrences.push(make(*start, *end)),
            None => occurrences.push(make(*start, *start + duration)),
        }
    }

    // A moved instance can land in the window even when its original slot lies
    // outside the expanded range.
    for (original, change) in &overrides {
        if let Override::Moved { start, end } = change {
            if (*original < after || *original > upper) && !starts.contains(original) {
                occurrences.push(make(*start, *end));
            }
        }
    }

    Ok(occurrences)
}

/// Build the iCalendar DTSTART + RRULE block for a series.
fn rrule_text(record: &EventRecord, rule: &RecurrenceRule, tz: &Tz) -> String {
    let mut rrule = format!(
        "FREQ={};INTERVAL={}",
        rule.frequency.as_rrule(),
        rule.interval
    );

    if let Some(count) = rule.count {
        rrule.push_str(&format!(";COUNT={}", count));
    }

    // The rrule crate requires UNTIL and DTSTART to share the same timezone.
    // For UTC, UNTIL must end with "Z"; for other timezones, use bare local time.
    if let Some(until) = rule.until {
        let mut until_ical = until.with_timezone(tz).format("%Y%m%dT%H%M%S").to_string();
        if *tz == chrono_tz::UTC {
            until_ical.push('Z');
        }
        rrule.push_str(&format!(";UNTIL={}", until_ical));
    }

    if !rule.by_day.is_empty() {
        let days: Vec<&str> = rule.by_day.iter().map(|d| weekday_code(*d)).collect();
        rrule.push_str(&format!(";BYDAY={}", days.join(",")));
    }

    format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        tz.name(),
        record.start.with_timezone(tz).format("%Y%m%dT%H%M%S"),
        rrule
    )
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

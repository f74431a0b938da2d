//! Enumerate bookable slots from a weekly availability template.
//!
//! Walks the civil days of the period in the schedule's timezone. Each day's
//! absolute start is the previous day's absolute end, and the day's offset is
//! re-read there, so a 23- or 25-hour day never leaves a stale offset behind.
//! Candidate start times are laid out in local wall-clock time and resolved to
//! instants one by one:
//!
//! - local times inside a spring-forward gap produce no slot,
//! - repeated fall-back local times resolve once, to the earlier instant,
//! - slots whose span crosses a transition are rejected.

use std::collections::BTreeMap;

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::availability::{Period, ScheduleConfig};
use crate::conflict::OverlapChecker;
use crate::dst::{civil_day_start, crosses_transition, resolve_local};
use crate::error::Result;
use crate::expander::Occurrence;
use crate::offset::offset_millis_in;

/// A bookable interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    #[serde(with = "ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub end: DateTime<Utc>,
}

/// Every free slot of `schedule` on the civil days of `period`.
///
/// Days are visited from the local date containing `period.start` while the
/// day begins before `period.end`. Within each availability window candidates
/// start at the window start and advance by duration + interval for as long as
/// the whole meeting fits in the window. A candidate is admitted when it starts
/// at or after `not_before` and no occurrence makes it busy.
///
/// The result is sorted by start and has no duplicates.
///
/// # Errors
/// [`crate::BookingError::InvalidPeriod`], [`crate::BookingError::InvalidTimezone`]
/// or [`crate::BookingError::InvalidScheduleConfig`]; no partial result is returned.
pub fn generate_slots(
    schedule: &ScheduleConfig,
    occurrences: &[Occurrence],
    period: &Period,
    not_before: DateTime<Utc>,
) -> Result<Vec<Slot>> {
    period.validate()?;
    let tz = schedule.validate()?;

    let duration_ms = schedule.meeting_duration_ms;
    let step_ms = duration_ms.saturating_add(schedule.meeting_interval_ms);
    let duration = Duration::milliseconds(duration_ms);
    let mut checker = OverlapChecker::new(occurrences);
    let mut slots = Vec::new();

    let mut date = period.start.with_timezone(&tz).date_naive();
    let mut day_start = civil_day_start(&tz, date);

    while day_start < period.end {
        let day_offset = offset_millis_in(&tz, day_start);
        let midnight = date.and_time(NaiveTime::MIN);

        let mut windows = schedule.availability.windows(date.weekday()).to_vec();
        windows.sort();

        for window in windows {
            let mut at = window.start;
            while at.saturating_add(duration_ms) <= window.end {
                let local = midnight + Duration::milliseconds(at);
                at = at.saturating_add(step_ms);

                let Some(start) = resolve_local(&tz, local) else {
                    continue;
                };
                let end = start + duration;
                if start < not_before || crosses_transition(&tz, start, end) {
                    continue;
                }
                if !checker.is_busy(start, end, day_offset) {
                    slots.push(Slot { start, end });
                }
            }
        }

        let Some(next) = date.succ_opt() else {
            break;
        };
        date = next;
        day_start = civil_day_start(&tz, date);
    }

    slots.sort();
    slots.dedup();

    tracing::debug!(
        time_zone = %schedule.time_zone,
        occurrences = occurrences.len(),
        slots = slots.len(),
        "generated slots"
    );
    Ok(slots)
}

/// Bucket slots by the civil date of their start in `tz`.
pub fn group_by_day(slots: &[Slot], tz: &Tz) -> BTreeMap<NaiveDate, Vec<Slot>> {
    let mut days: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        days.entry(slot.start.with_timezone(tz).date_naive())
            .or_default()
            .push(*slot);
    }
    days
}

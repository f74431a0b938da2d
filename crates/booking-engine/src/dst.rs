//! DST transition handling for wall-clock slot candidates.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::offset::offset_millis_in;

/// Resolve a local wall-clock time to an instant.
///
/// Local times inside a spring-forward gap do not exist and yield `None`.
/// Local times repeated by a fall-back resolve to the earlier instant, so the
/// same wall-clock label never produces two instants.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// First instant of the civil day `date` in `tz`.
///
/// A few zones move their clocks at midnight, in which case local 00:00 does not
/// exist and the day begins at the end of the gap.
pub fn civil_day_start(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Gaps are at most a few hours and always start on a quarter hour.
    (0..=16)
        .map(|quarter| midnight + Duration::minutes(15 * quarter))
        .find_map(|local| resolve_local(tz, local))
        .unwrap_or_else(|| {
            let offset = offset_millis_in(tz, midnight.and_utc());
            midnight.and_utc() - Duration::milliseconds(offset)
        })
}

/// Whether the zone's offset changes inside `[start, end)`.
pub fn crosses_transition(tz: &Tz, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    if end <= start {
        return false;
    }
    let last = end - Duration::milliseconds(1);
    offset_millis_in(tz, start) != offset_millis_in(tz, last)
}

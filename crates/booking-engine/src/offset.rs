//! UTC offset lookups for IANA timezones.
//!
//! Every lookup consults the zone's civil calendar rules at the given instant,
//! so the same zone yields different offsets on either side of a DST change.
//! Offsets are signed milliseconds with `local = instant + offset`.

use std::collections::HashMap;

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{BookingError, Result};

/// Parse an IANA timezone identifier (e.g. `"Europe/Berlin"`).
///
/// # Errors
/// Returns [`BookingError::InvalidTimezone`] for identifiers chrono-tz does not know.
pub fn parse_timezone(zone_id: &str) -> Result<Tz> {
    zone_id
        .parse()
        .map_err(|_| BookingError::InvalidTimezone(zone_id.to_string()))
}

/// Offset of `zone_id` at `instant`, in milliseconds.
///
/// # Errors
/// Returns [`BookingError::InvalidTimezone`] if `zone_id` is not recognized.
pub fn offset_millis(instant: DateTime<Utc>, zone_id: &str) -> Result<i64> {
    let tz = parse_timezone(zone_id)?;
    Ok(offset_millis_in(&tz, instant))
}

/// Offset of an already parsed zone at `instant`, in milliseconds.
pub fn offset_millis_in(tz: &Tz, instant: DateTime<Utc>) -> i64 {
    let seconds = tz
        .offset_from_utc_datetime(&instant.naive_utc())
        .fix()
        .local_minus_utc();
    i64::from(seconds) * 1000
}

/// Offset memo scoped to a single computation.
///
/// Keyed by zone name and exact instant, so a hit can never return an offset
/// that differs from a fresh lookup. Build one per call and drop it afterwards.
#[derive(Debug, Default)]
pub struct OffsetMemo {
    entries: HashMap<(&'static str, i64), i64>,
}

impl OffsetMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_millis(&mut self, tz: &Tz, instant: DateTime<Utc>) -> i64 {
        *self
            .entries
            .entry((tz.name(), instant.timestamp_millis()))
            .or_insert_with(|| offset_millis_in(tz, instant))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Host schedule configuration: weekly availability template and meeting shape.
//!
//! Availability is a per-weekday list of windows, each an offset range in
//! milliseconds from local midnight in the schedule's timezone. Weekdays are
//! keyed 0..=6 with 0 = Sunday. A weekday with no windows is unavailable.

use std::collections::BTreeMap;

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::offset::parse_timezone;

/// Length of a regular civil day, in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// One bookable window within a day, as millisecond offsets from local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: i64,
    pub end: i64,
}

impl AvailabilityWindow {
    /// Window from `start_hour:start_min` to `end_hour:end_min` local time.
    pub fn hours(start_hour: u32, start_min: u32, end_hour: u32, end_min: u32) -> Self {
        let ms = |h: u32, m: u32| (i64::from(h) * 60 + i64::from(m)) * 60_000;
        Self {
            start: ms(start_hour, start_min),
            end: ms(end_hour, end_min),
        }
    }
}

/// Weekday → windows mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityTemplate {
    days: BTreeMap<u8, Vec<AvailabilityWindow>>,
}

impl AvailabilityTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the windows for `weekday`, replacing any previous ones.
    pub fn with_day(mut self, weekday: Weekday, windows: Vec<AvailabilityWindow>) -> Self {
        self.days
            .insert(weekday.num_days_from_sunday() as u8, windows);
        self
    }

    /// Windows configured for `weekday`, in the order they were given.
    pub fn windows(&self, weekday: Weekday) -> &[AvailabilityWindow] {
        self.days
            .get(&(weekday.num_days_from_sunday() as u8))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn validate(&self) -> Result<()> {
        for (day, windows) in &self.days {
            if *day > 6 {
                return Err(BookingError::InvalidScheduleConfig(format!(
                    "weekday {} is outside 0..=6",
                    day
                )));
            }
            for w in windows {
                if w.start < 0 || w.end > DAY_MS || w.start >= w.end {
                    return Err(BookingError::InvalidScheduleConfig(format!(
                        "window {}..{} on weekday {} is not within one day",
                        w.start, w.end, day
                    )));
                }
            }
            let mut sorted = windows.clone();
            sorted.sort();
            if sorted.windows(2).any(|pair| pair[0].end > pair[1].start) {
                return Err(BookingError::InvalidScheduleConfig(format!(
                    "overlapping windows on weekday {}",
                    day
                )));
            }
        }
        Ok(())
    }
}

/// A host's bookable schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// IANA timezone the availability template is expressed in.
    pub time_zone: String,
    /// Length of each meeting, in milliseconds.
    pub meeting_duration_ms: i64,
    /// Gap between the end of one slot and the start of the next, in milliseconds.
    #[serde(default)]
    pub meeting_interval_ms: i64,
    pub availability: AvailabilityTemplate,
}

impl ScheduleConfig {
    /// Check the config and resolve its timezone.
    ///
    /// # Errors
    /// [`BookingError::InvalidTimezone`] for an unknown zone,
    /// [`BookingError::InvalidScheduleConfig`] for a duration outside
    /// `1..=DAY_MS`, an interval outside `0..=DAY_MS`, or malformed
    /// availability windows.
    pub fn validate(&self) -> Result<Tz> {
        let tz = parse_timezone(&self.time_zone)?;
        if self.meeting_duration_ms <= 0 || self.meeting_duration_ms > DAY_MS {
            return Err(BookingError::InvalidScheduleConfig(format!(
                "meeting duration must be within 1..={}ms, got {}ms",
                DAY_MS, self.meeting_duration_ms
            )));
        }
        if self.meeting_interval_ms < 0 || self.meeting_interval_ms > DAY_MS {
            return Err(BookingError::InvalidScheduleConfig(format!(
                "meeting interval must be within 0..={}ms, got {}ms",
                DAY_MS, self.meeting_interval_ms
            )));
        }
        self.availability.validate()?;
        Ok(tz)
    }
}

/// A query window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(with = "ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub end: DateTime<Utc>,
}

impl Period {
    /// # Errors
    /// [`BookingError::InvalidPeriod`] when `end` precedes `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let period = Self { start, end };
        period.validate()?;
        Ok(period)
    }

    /// Check that `end` does not precede `start`.
    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(BookingError::InvalidPeriod(format!(
                "end {} precedes start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

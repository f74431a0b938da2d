//! Decide whether a candidate slot collides with existing occurrences.
//!
//! Timed occurrences are compared as they are. All-day occurrences are first
//! widened to the whole local calendar day they start on, using the
//! occurrence's own zone or, failing that, the caller's fallback offset.
//!
//! A slot that only touches an occurrence (one ends exactly when the other
//! starts) is NOT busy, so back-to-back bookings are allowed.

use chrono::{DateTime, Duration, Utc};

use crate::availability::DAY_MS;
use crate::expander::Occurrence;
use crate::offset::OffsetMemo;

/// Busy/free decisions against a fixed set of occurrences.
///
/// Holds an offset memo for all-day normalization; create one per computation.
#[derive(Debug)]
pub struct OverlapChecker<'a> {
    occurrences: &'a [Occurrence],
    memo: OffsetMemo,
}

impl<'a> OverlapChecker<'a> {
    pub fn new(occurrences: &'a [Occurrence]) -> Self {
        Self {
            occurrences,
            memo: OffsetMemo::new(),
        }
    }

    /// Whether any occurrence overlaps `[slot_start, slot_end)`.
    ///
    /// `fallback_offset_ms` is used to find the local day of all-day
    /// occurrences that carry no zone of their own.
    pub fn is_busy(
        &mut self,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
        fallback_offset_ms: i64,
    ) -> bool {
        let occurrences = self.occurrences;
        occurrences
            .iter()
            .any(|o| self.blocks(o, slot_start, slot_end, fallback_offset_ms))
    }

    /// Event ids of every occurrence overlapping `[slot_start, slot_end)`, in input order.
    pub fn conflicting(
        &mut self,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
        fallback_offset_ms: i64,
    ) -> Vec<String> {
        let occurrences = self.occurrences;
        occurrences
            .iter()
            .filter(|o| self.blocks(o, slot_start, slot_end, fallback_offset_ms))
            .map(|o| o.event_id.clone())
            .collect()
    }

    fn blocks(
        &mut self,
        occurrence: &Occurrence,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
        fallback_offset_ms: i64,
    ) -> bool {
        let (start, end) = if occurrence.all_day {
            self.local_day(occurrence, fallback_offset_ms)
        } else {
            (occurrence.start, occurrence.end)
        };
        overlaps(start, end, slot_start, slot_end)
    }

    /// The local calendar day of an all-day occurrence, as `[midnight, midnight + 1 day - 1ms]`.
    fn local_day(
        &mut self,
        occurrence: &Occurrence,
        fallback_offset_ms: i64,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let offset = match &occurrence.time_zone {
            Some(tz) => self.memo.offset_millis(tz, occurrence.start),
            None => fallback_offset_ms,
        };
        let local_ms = occurrence.start.timestamp_millis() + offset;
        let local_midnight = local_ms.div_euclid(DAY_MS) * DAY_MS;
        let midnight = occurrence.start + Duration::milliseconds(local_midnight - local_ms);
        (midnight, midnight + Duration::milliseconds(DAY_MS - 1))
    }
}

/// Overlap test between an occurrence `[start, end]` and a slot `[slot_start, slot_end)`.
///
/// Busy when the occurrence covers the whole slot, or when either of its
/// endpoints falls strictly inside the slot.
pub fn overlaps(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
) -> bool {
    (start <= slot_start && end >= slot_end)
        || (start > slot_start && start < slot_end)
        || (end > slot_start && end < slot_end)
}

/// Whether any of `occurrences` overlaps `[slot_start, slot_end)`.
///
/// One-shot form of [`OverlapChecker::is_busy`].
pub fn is_busy(
    occurrences: &[Occurrence],
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    fallback_offset_ms: i64,
) -> bool {
    OverlapChecker::new(occurrences).is_busy(slot_start, slot_end, fallback_offset_ms)
}

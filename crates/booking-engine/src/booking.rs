//! Request-level flows: list a host's open slots, vet a booking or reschedule.
//!
//! Schedules and events come from a [`CalendarStore`], which hands back an
//! already-fetched snapshot. These checks are point-in-time decisions; the
//! store's writer must still guard the create/update that follows (unique
//! constraint per calendar and slot, or a re-check inside its transaction).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::{Period, ScheduleConfig};
use crate::conflict::OverlapChecker;
use crate::error::{BookingError, Result};
use crate::expander::{expand_events_for, EventRecord};
use crate::offset::offset_millis_in;
use crate::slots::{generate_slots, Slot};

/// Read access to schedules and calendar events.
pub trait CalendarStore {
    fn schedule(&self, schedule_id: &str) -> Option<ScheduleConfig>;

    /// Raw records from `calendar_ids` that may touch `[window_start, window_end]`.
    ///
    /// Recurring definitions must be returned whatever their first occurrence.
    fn events(
        &self,
        calendar_ids: &[String],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<EventRecord>;
}

/// In-process [`CalendarStore`] over fixed schedules and calendars.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    schedules: HashMap<String, ScheduleConfig>,
    calendars: HashMap<String, Vec<EventRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedule(mut self, schedule_id: impl Into<String>, schedule: ScheduleConfig) -> Self {
        self.schedules.insert(schedule_id.into(), schedule);
        self
    }

    pub fn with_events(mut self, calendar_id: impl Into<String>, events: Vec<EventRecord>) -> Self {
        self.calendars
            .entry(calendar_id.into())
            .or_default()
            .extend(events);
        self
    }
}

impl CalendarStore for MemoryStore {
    fn schedule(&self, schedule_id: &str) -> Option<ScheduleConfig> {
        self.schedules.get(schedule_id).cloned()
    }

    fn events(
        &self,
        calendar_ids: &[String],
        _window_start: DateTime<Utc>,
        _window_end: DateTime<Utc>,
    ) -> Vec<EventRecord> {
        calendar_ids
            .iter()
            .filter_map(|id| self.calendars.get(id))
            .flatten()
            .cloned()
            .collect()
    }
}

/// Longest period, in days, a single timeslot listing may cover.
pub const MAX_PERIOD_DAYS: u32 = 366;

/// Open slots of a host over `period_days` days from `period_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeslotsRequest {
    pub schedule_id: String,
    /// The host; only events they take part in block slots.
    pub person_id: String,
    pub calendar_ids: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub client_now: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub period_start: DateTime<Utc>,
    pub period_days: u32,
}

/// A guest's attempt to book `slot` with the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub schedule_id: String,
    pub person_id: String,
    pub calendar_ids: Vec<String>,
    pub slot: Slot,
}

/// A guest's attempt to move their booked event `event_id` to `slot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub schedule_id: String,
    pub person_id: String,
    pub calendar_ids: Vec<String>,
    pub event_id: String,
    pub slot: Slot,
}

/// List the host's free slots for the requested days.
///
/// Slots starting before `client_now` are dropped, and the period never starts
/// before `client_now`.
///
/// # Errors
/// [`BookingError::ScheduleNotFound`] when the store has no such schedule,
/// [`BookingError::InvalidPeriod`] when `period_days` exceeds
/// [`MAX_PERIOD_DAYS`], plus any error from [`generate_slots`].
pub fn list_timeslots<S: CalendarStore + ?Sized>(
    store: &S,
    request: &TimeslotsRequest,
) -> Result<Vec<Slot>> {
    let schedule = load_schedule(store, &request.schedule_id)?;

    if request.period_days > MAX_PERIOD_DAYS {
        return Err(BookingError::InvalidPeriod(format!(
            "{} days exceeds the limit of {}",
            request.period_days, MAX_PERIOD_DAYS
        )));
    }
    let period_end = request
        .period_start
        .checked_add_signed(Duration::days(i64::from(request.period_days)))
        .ok_or_else(|| {
            BookingError::InvalidPeriod(format!(
                "{} days after {} is out of range",
                request.period_days, request.period_start
            ))
        })?;
    let period_start = request.period_start.max(request.client_now);
    if period_start > period_end {
        // Validate anyway so a broken schedule is still reported.
        schedule.validate()?;
        return Ok(Vec::new());
    }
    let period = Period::new(period_start, period_end)?;

    let records = store.events(&request.calendar_ids, period.start, period.end);
    let participants = BTreeSet::from([request.person_id.clone()]);
    let expansion = expand_events_for(&records, period.start, period.end, &participants);

    generate_slots(&schedule, &expansion.occurrences, &period, request.client_now)
}

/// Accept or reject a new booking.
///
/// # Errors
/// [`BookingError::SlotBusy`] naming the blocking events, or
/// [`BookingError::ScheduleNotFound`], [`BookingError::InvalidPeriod`] and
/// schedule validation errors.
pub fn check_booking<S: CalendarStore + ?Sized>(store: &S, request: &BookingRequest) -> Result<()> {
    check_slot(
        store,
        &request.schedule_id,
        &request.person_id,
        &request.calendar_ids,
        request.slot,
        None,
    )
}

/// Accept or reject moving a booked event. The event's own current
/// occurrence never blocks its new slot.
///
/// # Errors
/// Same as [`check_booking`].
pub fn check_reschedule<S: CalendarStore + ?Sized>(
    store: &S,
    request: &RescheduleRequest,
) -> Result<()> {
    check_slot(
        store,
        &request.schedule_id,
        &request.person_id,
        &request.calendar_ids,
        request.slot,
        Some(&request.event_id),
    )
}

fn load_schedule<S: CalendarStore + ?Sized>(store: &S, schedule_id: &str) -> Result<ScheduleConfig> {
    store
        .schedule(schedule_id)
        .ok_or_else(|| BookingError::ScheduleNotFound(schedule_id.to_string()))
}

fn check_slot<S: CalendarStore + ?Sized>(
    store: &S,
    schedule_id: &str,
    person_id: &str,
    calendar_ids: &[String],
    slot: Slot,
    ignore_event: Option<&str>,
) -> Result<()> {
    let schedule = load_schedule(store, schedule_id)?;
    let tz = schedule.validate()?;
    Period::new(slot.start, slot.end)?;

    let records = store.events(calendar_ids, slot.start, slot.end);
    let participants = BTreeSet::from([person_id.to_string()]);
    let mut expansion = expand_events_for(&records, slot.start, slot.end, &participants);
    if let Some(event_id) = ignore_event {
        expansion.occurrences.retain(|o| o.event_id != event_id);
    }

    let fallback = offset_millis_in(&tz, slot.start);
    let conflicting =
        OverlapChecker::new(&expansion.occurrences).conflicting(slot.start, slot.end, fallback);
    if conflicting.is_empty() {
        Ok(())
    } else {
        tracing::info!(
            schedule_id,
            start = %slot.start,
            end = %slot.end,
            conflicts = conflicting.len(),
            "rejecting busy slot"
        );
        Err(BookingError::SlotBusy {
            start: slot.start,
            end: slot.end,
            conflicting,
        })
    }
}

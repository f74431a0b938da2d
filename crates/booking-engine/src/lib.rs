//! # booking-engine
//!
//! Bookable slot computation and conflict detection for meeting schedules.
//!
//! Given a host's weekly availability, their existing calendar events
//! (recurring ones included) and a query period, the engine lists every free
//! slot and decides whether a specific candidate slot is busy, with wall-clock
//! alignment that holds across timezones and DST transitions.
//!
//! Everything is a pure function of its inputs; no state survives a call.
//!
//! ## Modules
//!
//! - [`offset`] — UTC offset of an IANA zone at an instant
//! - [`dst`] — Local time resolution and transition detection
//! - [`expander`] — Raw events and recurrence rules → concrete occurrences
//! - [`conflict`] — Busy/free decision for a candidate slot
//! - [`availability`] — Schedule config, weekly template, query period
//! - [`slots`] — Bookable slot enumeration and per-day grouping
//! - [`booking`] — Timeslot listing and booking/reschedule checks over a calendar store
//! - [`millis`] — Epoch-millisecond serde adapters
//! - [`error`] — Error types

pub mod availability;
pub mod booking;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod expander;
pub mod millis;
pub mod offset;
pub mod slots;

pub use availability::{AvailabilityTemplate, AvailabilityWindow, Period, ScheduleConfig};
pub use booking::{
    check_booking, check_reschedule, list_timeslots, BookingRequest, CalendarStore, MemoryStore,
    RescheduleRequest, TimeslotsRequest, MAX_PERIOD_DAYS,
};
pub use conflict::{is_busy, OverlapChecker};
pub use error::BookingError;
pub use expander::{
    expand_events, expand_events_for, EventKind, EventRecord, Expansion, Frequency, Occurrence,
    Override, RecurrenceRule,
};
pub use offset::{offset_millis, parse_timezone};
pub use slots::{generate_slots, group_by_day, Slot};

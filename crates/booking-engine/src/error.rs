//! Error types for booking-engine operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid schedule config: {0}")]
    InvalidScheduleConfig(String),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("Malformed recurrence rule on event {event_id}: {reason}")]
    MalformedRecurrenceRule { event_id: String, reason: String },

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Slot {start} - {end} is already busy")]
    SlotBusy {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        conflicting: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, BookingError>;

//! `booking` CLI: list free slots and check candidate bookings against a
//! calendar snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Free slots for one week, as epoch-millisecond JSON
//! booking slots -i snapshot.json --from 2026-03-16T00:00:00Z --days 7
//!
//! # Only the host's events block, and nothing before "now"
//! booking slots -i snapshot.json --from 2026-03-16T00:00:00Z --days 7 \
//!     --participant alice --not-before 2026-03-16T10:20:00Z
//!
//! # Group by local calendar day
//! booking slots -i snapshot.json --from 2026-03-16T00:00:00Z --days 7 --by-day
//!
//! # Is a candidate slot busy? (snapshot from stdin)
//! cat snapshot.json | booking check --start 2026-03-16T12:00:00Z --end 2026-03-16T12:30:00Z
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=booking=debug,booking_engine=debug` for details.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};

use anyhow::{Context, Result};
use booking_engine::availability::{Period, ScheduleConfig};
use booking_engine::booking::MAX_PERIOD_DAYS;
use booking_engine::conflict::OverlapChecker;
use booking_engine::expander::{expand_events_for, EventRecord, Expansion};
use booking_engine::offset::offset_millis_in;
use booking_engine::slots::{generate_slots, group_by_day};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "booking", version, about = "Bookable slot and conflict engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List free slots of the snapshot's schedule
    Slots {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Period start (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,
        /// Period length in days
        #[arg(
            long,
            default_value_t = 7,
            value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_PERIOD_DAYS))
        )]
        days: u32,
        /// Drop slots starting before this instant (RFC 3339); defaults to --from
        #[arg(long)]
        not_before: Option<DateTime<Utc>>,
        /// Only events with this participant block slots (repeatable)
        #[arg(long)]
        participant: Vec<String>,
        /// Group slots by local date in the schedule's timezone
        #[arg(long)]
        by_day: bool,
    },
    /// Check whether a candidate slot collides with existing events
    Check {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Slot start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Slot end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
        /// Only events with this participant block the slot (repeatable)
        #[arg(long)]
        participant: Vec<String>,
        /// Event being rescheduled; its own occurrence never blocks
        #[arg(long)]
        ignore_event: Option<String>,
    },
}

/// A schedule and the events of the calendars it books against.
#[derive(Deserialize)]
struct Snapshot {
    schedule: ScheduleConfig,
    #[serde(default)]
    events: Vec<EventRecord>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("booking_engine=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Slots {
            input,
            from,
            days,
            not_before,
            participant,
            by_day,
        } => {
            let snapshot = read_snapshot(input.as_deref())?;
            let tz = snapshot
                .schedule
                .validate()
                .context("Invalid schedule in snapshot")?;
            let end = from
                .checked_add_signed(Duration::days(i64::from(days)))
                .with_context(|| format!("Period of {} days from {} is out of range", days, from))?;
            let period = Period::new(from, end)?;
            let participants: BTreeSet<String> = participant.into_iter().collect();

            let expansion =
                expand_events_for(&snapshot.events, period.start, period.end, &participants);
            log_expansion(&expansion);

            let slots = generate_slots(
                &snapshot.schedule,
                &expansion.occurrences,
                &period,
                not_before.unwrap_or(from),
            )
            .context("Failed to generate slots")?;

            let json = if by_day {
                let grouped: BTreeMap<String, _> = group_by_day(&slots, &tz)
                    .into_iter()
                    .map(|(date, slots)| (date.to_string(), slots))
                    .collect();
                serde_json::to_string_pretty(&grouped)?
            } else {
                serde_json::to_string_pretty(&slots)?
            };
            println!("{}", json);
        }
        Commands::Check {
            input,
            start,
            end,
            participant,
            ignore_event,
        } => {
            let snapshot = read_snapshot(input.as_deref())?;
            let tz = snapshot
                .schedule
                .validate()
                .context("Invalid schedule in snapshot")?;
            let slot = Period::new(start, end).context("Slot end precedes its start")?;
            let participants: BTreeSet<String> = participant.into_iter().collect();

            let mut expansion =
                expand_events_for(&snapshot.events, slot.start, slot.end, &participants);
            log_expansion(&expansion);
            if let Some(event_id) = ignore_event.as_deref() {
                expansion.occurrences.retain(|o| o.event_id != event_id);
            }

            let fallback = offset_millis_in(&tz, slot.start);
            let conflicting = OverlapChecker::new(&expansion.occurrences).conflicting(
                slot.start,
                slot.end,
                fallback,
            );
            let result = serde_json::json!({
                "busy": !conflicting.is_empty(),
                "conflicting": conflicting,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn log_expansion(expansion: &Expansion) {
    tracing::debug!(
        occurrences = expansion.occurrences.len(),
        skipped = expansion.skipped.len(),
        "expanded snapshot events"
    );
}

fn read_snapshot(path: Option<&str>) -> Result<Snapshot> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("Failed to parse snapshot JSON")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

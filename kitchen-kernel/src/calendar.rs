/**
 * CALENDAR POLLER - today's events of the shared family calendar
 *
 * ROLE: read events for [start of today, +24h), keep only the named calendar,
 * and split them into the morning and afternoon columns of the panel.
 *
 * HOW IT WORKS:
 * - CalendarSource trait = the calendar binding (blocking, may be denied access)
 * - JsonFileCalendarSource = production binding on an exported JSON event list
 * - bucket_events = pure classification, all-day events go to the morning
 * - CalendarPoller = cool-down gate + fetch helper run on the blocking pool
 */

use crate::config::CalendarConf;
use crate::models::CalendarBuckets;
use crate::poller::{Cooldown, CooldownPolicy};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar access denied")]
    PermissionDenied,
    #[error("calendar unavailable: {0}")]
    Unavailable(String),
    #[error("calendar data malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<io::Error> for CalendarError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => CalendarError::PermissionDenied,
            _ => CalendarError::Unavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    /// Title of the calendar the event belongs to.
    pub calendar: String,
    #[serde(default)]
    pub all_day: bool,
    /// Local wall-clock start.
    pub start: NaiveDateTime,
}

pub trait CalendarSource: Send + Sync {
    /// Events starting in `[start, end)`, in the source's own order.
    fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// Reads a JSON array of [`CalendarEvent`] on every call.
#[derive(Debug, Clone)]
pub struct JsonFileCalendarSource {
    path: PathBuf,
}

impl JsonFileCalendarSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl CalendarSource for JsonFileCalendarSource {
    fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let content = std::fs::read_to_string(&self.path)?;
        let events: Vec<CalendarEvent> = serde_json::from_str(&content)?;
        Ok(events
            .into_iter()
            .filter(|e| e.start >= start && e.start < end)
            .collect())
    }
}

/// `[midnight, midnight + 24h)` of the local day containing `now`.
pub fn day_window(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let start = now.date().and_time(chrono::NaiveTime::MIN);
    (start, start + TimeDelta::hours(24))
}

pub fn bucket_events(events: &[CalendarEvent], calendar: &str) -> CalendarBuckets {
    let mut buckets = CalendarBuckets::default();
    for event in events.iter().filter(|e| e.calendar == calendar) {
        if event.all_day {
            buckets.morning.push(event.title.clone());
            continue;
        }
        let line = format!("{}  {}", event.start.format("%H:%M"), event.title);
        if event.start.hour() < 12 {
            buckets.morning.push(line);
        } else {
            buckets.afternoon.push(line);
        }
    }
    buckets
}

pub struct CalendarPoller {
    source: Arc<dyn CalendarSource>,
    calendar: String,
    gate: Cooldown,
}

impl CalendarPoller {
    pub fn new(source: Arc<dyn CalendarSource>, conf: &CalendarConf) -> Self {
        Self {
            source,
            calendar: conf.name.clone(),
            gate: Cooldown::new(conf.interval(), CooldownPolicy::AfterAttempt),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.gate.is_due(now)
    }

    /// Marks a poll as started and hands back what the worker needs.
    pub fn begin(&mut self, now: DateTime<Utc>) -> (Arc<dyn CalendarSource>, String) {
        self.gate.start(now);
        (self.source.clone(), self.calendar.clone())
    }

    pub fn finish(&mut self, now: DateTime<Utc>, success: bool) {
        self.gate.finish(now, success);
    }
}

/// One blocking read of today's buckets.
pub fn fetch_today(
    source: &dyn CalendarSource,
    calendar: &str,
    local_now: NaiveDateTime,
) -> Result<CalendarBuckets, CalendarError> {
    let (start, end) = day_window(local_now);
    let events = source.events_between(start, end)?;
    Ok(bucket_events(&events, calendar))
}

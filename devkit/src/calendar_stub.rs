/*!
Calendar source stub

Holds a settable list of events, can be flipped into "permission denied"
and counts how often the scheduler read it.
*/

use chrono::{NaiveDate, NaiveDateTime};
use kitchen_kernel::calendar::{CalendarError, CalendarEvent, CalendarSource};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct StubCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    denied: Mutex<bool>,
    calls: AtomicUsize,
}

impl StubCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let stub = Self::new();
        stub.set_events(events);
        stub
    }

    pub fn set_events(&self, events: Vec<CalendarEvent>) {
        *self.events.lock() = events;
    }

    pub fn set_denied(&self, denied: bool) {
        *self.denied.lock() = denied;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CalendarSource for StubCalendar {
    fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.denied.lock() {
            return Err(CalendarError::PermissionDenied);
        }
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.start >= start && e.start < end)
            .cloned()
            .collect())
    }
}

/// Builds [`CalendarEvent`]s for one day without spelling out every field.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    day: NaiveDate,
    calendar: String,
}

impl EventBuilder {
    pub fn new(day: NaiveDate) -> Self {
        Self { day, calendar: "Delad".to_string() }
    }

    /// Events built after this call belong to `calendar`.
    pub fn on(mut self, calendar: &str) -> Self {
        self.calendar = calendar.to_string();
        self
    }

    pub fn timed(&self, title: &str, hour: u32, minute: u32) -> CalendarEvent {
        CalendarEvent {
            title: title.to_string(),
            calendar: self.calendar.clone(),
            all_day: false,
            start: self.at(hour, minute),
        }
    }

    pub fn all_day(&self, title: &str) -> CalendarEvent {
        CalendarEvent {
            title: title.to_string(),
            calendar: self.calendar.clone(),
            all_day: true,
            start: self.at(0, 0),
        }
    }

    fn at(&self, hour: u32, minute: u32) -> NaiveDateTime {
        self.day
            .and_hms_opt(hour, minute, 0)
            .unwrap_or_else(|| self.day.and_time(chrono::NaiveTime::MIN))
    }
}

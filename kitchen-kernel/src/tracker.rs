//! Change tracker: compare-before-write of poller output into DisplayState.
//!
//! A field is only overwritten when its value differs, and the version only
//! advances when at least one field was overwritten. Identical repeated input
//! (the common case for hourly pollers) therefore never triggers a render.

use crate::models::{CalendarBuckets, ClockReading, DisplayState, WeatherSignal};
use chrono::{DateTime, Utc};

/// Fresh output of one producer.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Clock(ClockReading),
    Calendar(CalendarBuckets),
    Weather(WeatherSignal),
}

impl Update {
    pub fn source(&self) -> &'static str {
        match self {
            Update::Clock(_) => "clock",
            Update::Calendar(_) => "calendar",
            Update::Weather(_) => "weather",
        }
    }
}

fn replace<T: PartialEq + Clone>(slot: &mut T, fresh: &T) -> bool {
    if slot == fresh {
        return false;
    }
    *slot = fresh.clone();
    true
}

impl DisplayState {
    /// Applies `update`, advancing the version to `now` if anything changed.
    pub fn apply(&mut self, update: &Update, now: DateTime<Utc>) -> bool {
        // `|` rather than `||`: every field of the update must be compared.
        let changed = match update {
            Update::Clock(reading) => {
                replace(&mut self.weekday_label, &reading.weekday_label)
                    | replace(&mut self.date_label, &reading.date_label)
            }
            Update::Calendar(buckets) => {
                replace(&mut self.morning_events, &buckets.morning)
                    | replace(&mut self.afternoon_events, &buckets.afternoon)
            }
            Update::Weather(signal) => {
                replace(&mut self.needs_sunscreen, &signal.needs_sunscreen)
                    | replace(&mut self.needs_raingear, &signal.needs_raingear)
            }
        };
        if changed {
            self.version = self.version.advance(now);
        }
        changed
    }
}

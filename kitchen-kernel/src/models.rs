use axum::body::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Marker of a DisplayState revision. Compared for equality to detect change,
/// ordered to check that an artifact never runs ahead of the state it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version(DateTime<Utc>);

impl Version {
    /// Sentinel carried by state and artifact before anything was populated.
    pub const NEVER: Version = Version(DateTime::<Utc>::UNIX_EPOCH);

    pub fn at(instant: DateTime<Utc>) -> Self {
        Version(instant)
    }

    /// Next version after `self`, stamped `now` unless that would not move forward.
    pub fn advance(self, now: DateTime<Utc>) -> Self {
        if now > self.0 {
            Version(now)
        } else {
            Version(self.0 + TimeDelta::microseconds(1))
        }
    }

    pub fn instant(self) -> DateTime<Utc> {
        self.0
    }

    /// Unix epoch seconds with microsecond fraction, e.g. `1713600000.250000`.
    pub fn to_epoch_string(self) -> String {
        format!("{}.{:06}", self.0.timestamp(), self.0.timestamp_subsec_micros())
    }
}

/// Everything the panel shows. Mutated only through the change tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub weekday_label: String,
    pub date_label: String,
    pub morning_events: Vec<String>,
    pub afternoon_events: Vec<String>,
    pub needs_sunscreen: bool,
    pub needs_raingear: bool,
    pub version: Version,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            weekday_label: String::new(),
            date_label: String::new(),
            morning_events: Vec::new(),
            afternoon_events: Vec::new(),
            needs_sunscreen: false,
            needs_raingear: false,
            version: Version::NEVER,
        }
    }
}

/// Labels derived from the wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockReading {
    pub weekday_label: String,
    pub date_label: String,
}

/// Today's events of the shared calendar, split at noon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarBuckets {
    pub morning: Vec<String>,
    pub afternoon: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherSignal {
    pub needs_sunscreen: bool,
    pub needs_raingear: bool,
}

/// Latest published PNG and the state version it was rendered from.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub image: Bytes,
    pub version: Version,
}

impl Artifact {
    /// Placeholder served before the first successful render.
    pub fn empty() -> Self {
        Self { image: Bytes::new(), version: Version::NEVER }
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

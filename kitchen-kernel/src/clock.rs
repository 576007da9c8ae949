//! Clock source: current local time plus the weekday/date labels derived from it.
//!
//! Weekday numbering differs between platforms (Sunday = 1 on some, Monday = 1
//! on others), so the table is always consulted through an explicit
//! [`FirstWeekday`] convention.

use crate::models::ClockReading;
use chrono::{DateTime, Datelike, Local, TimeDelta, TimeZone, Weekday};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for tests and the devkit harness.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstWeekday {
    #[default]
    Monday,
    Sunday,
}

impl FirstWeekday {
    fn first(self) -> Weekday {
        match self {
            FirstWeekday::Monday => Weekday::Mon,
            FirstWeekday::Sunday => Weekday::Sun,
        }
    }

    /// 1-based position of `day` in a week that starts on `self`.
    pub fn ordinal(self, day: Weekday) -> u32 {
        match self {
            FirstWeekday::Monday => day.number_from_monday(),
            FirstWeekday::Sunday => day.number_from_sunday(),
        }
    }

    /// Inverse of [`FirstWeekday::ordinal`]; `None` outside `1..=7`.
    pub fn weekday_at(self, ordinal: u32) -> Option<Weekday> {
        if !(1..=7).contains(&ordinal) {
            return None;
        }
        let mut day = self.first();
        for _ in 1..ordinal {
            day = day.succ();
        }
        Some(day)
    }
}

fn swedish_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Måndag",
        Weekday::Tue => "Tisdag",
        Weekday::Wed => "Onsdag",
        Weekday::Thu => "Torsdag",
        Weekday::Fri => "Fredag",
        Weekday::Sat => "Lördag",
        Weekday::Sun => "Söndag",
    }
}

/// Weekday name for a numbered day under the given numbering convention.
pub fn weekday_label(ordinal: u32, first: FirstWeekday) -> Option<&'static str> {
    first.weekday_at(ordinal).map(swedish_name)
}

pub fn read<Tz: TimeZone>(now: &DateTime<Tz>, first: FirstWeekday) -> ClockReading {
    let ordinal = first.ordinal(now.weekday());
    let weekday = weekday_label(ordinal, first).unwrap_or_else(|| {
        tracing::warn!(ordinal, "weekday ordinal outside table, leaving label blank");
        ""
    });
    ClockReading {
        weekday_label: weekday.to_string(),
        date_label: now.day().to_string(),
    }
}

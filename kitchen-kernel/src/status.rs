use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Calendar,
    Weather,
    Render,
}

impl Source {
    fn label(self) -> &'static str {
        match self {
            Source::Calendar => "kalender",
            Source::Weather => "väder",
            Source::Render => "bild",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub uptime_seconds: u64,
    pub render_failures: u32,
    pub errors: BTreeMap<Source, String>,
    pub battery: Option<String>,
}

#[derive(Default)]
struct Board {
    errors: BTreeMap<Source, String>,
    battery: Option<String>,
}

/// User-visible health of the panel: last error per source and what the
/// client reported about its battery.
#[derive(Clone)]
pub struct StatusBoard {
    start_time: Instant,
    render_failures: Arc<AtomicU32>,
    board: Arc<Mutex<Board>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            render_failures: Arc::new(AtomicU32::new(0)),
            board: Arc::new(Mutex::new(Board::default())),
        }
    }

    pub fn record_error(&self, source: Source, err: &impl Display) {
        if source == Source::Render {
            self.render_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.board.lock().errors.insert(source, err.to_string());
    }

    pub fn clear(&self, source: Source) {
        self.board.lock().errors.remove(&source);
    }

    pub fn set_battery(&self, battery: String) {
        self.board.lock().battery = Some(battery);
    }

    /// One line for the panel footer, empty when all is well.
    pub fn label(&self) -> String {
        let board = self.board.lock();
        let mut parts = Vec::new();
        if let Some(battery) = &board.battery {
            parts.push(format!("batteri {battery}"));
        }
        for (source, err) in &board.errors {
            parts.push(format!("{}: {err}", source.label()));
        }
        parts.join(" | ")
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let board = self.board.lock();
        StatusSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            errors: board.errors.clone(),
            battery: board.battery.clone(),
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

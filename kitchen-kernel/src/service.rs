use crate::artifact::ArtifactStore;
use crate::clock::{self, Clock};
use crate::config::KitchenConfig;
use crate::models::{ClockReading, DisplayState};
use crate::schedule;
use crate::status::StatusBoard;
use crate::tracker::Update;
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Everything the scheduler and the HTTP handlers share. Cheap to clone.
#[derive(Clone)]
pub struct Service {
    /// Written only through [`Service::apply`].
    pub display: Arc<Mutex<DisplayState>>,
    pub artifacts: ArtifactStore,
    pub status: StatusBoard,
    pub config: Arc<KitchenConfig>,
    clock: Arc<dyn Clock>,
}

impl Service {
    pub fn new(config: KitchenConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            display: Arc::new(Mutex::new(DisplayState::default())),
            artifacts: ArtifactStore::new(),
            status: StatusBoard::new(),
            config: Arc::new(config),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    pub fn read_clock(&self) -> ClockReading {
        clock::read(&self.now(), self.config.display.first_weekday)
    }

    /// Single mutation path for DisplayState. Returns whether anything changed.
    pub fn apply(&self, update: &Update) -> bool {
        let now = self.now_utc();
        let mut state = self.display.lock();
        let changed = state.apply(update, now);
        if changed {
            tracing::debug!(
                source = update.source(),
                version = %state.version.to_epoch_string(),
                "display state changed"
            );
        }
        changed
    }

    pub fn display_snapshot(&self) -> DisplayState {
        self.display.lock().clone()
    }

    /// Whether the published artifact lags the current state.
    pub fn is_dirty(&self) -> bool {
        self.display.lock().version != self.artifacts.published_version()
    }

    pub fn refresh_in_seconds(&self) -> i64 {
        schedule::seconds_until_refresh(&self.now(), self.config.display.refresh_at)
    }
}

//! Scheduler: the one task that owns DisplayState mutation.
//!
//! A short tick refreshes the clock labels, starts due polls and drives the
//! pipeline. Calendar reads and PNG encoding go to the blocking pool, weather
//! fetches to a plain task; every result comes back over the channel and is
//! applied here.

use crate::calendar::{self, CalendarError, CalendarPoller};
use crate::encode::EncodeError;
use crate::models::{CalendarBuckets, WeatherSignal};
use crate::pipeline::{self, Encoded, Phase, Pipeline};
use crate::service::Service;
use crate::status::Source;
use crate::tracker::Update;
use crate::weather::{WeatherError, WeatherPoller};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{self, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

#[derive(Debug)]
pub enum SchedulerEvent {
    Calendar(Result<CalendarBuckets, CalendarError>),
    Weather(Result<WeatherSignal, WeatherError>),
    Encoded(Encoded),
}

pub struct Scheduler {
    service: Service,
    calendar: Option<CalendarPoller>,
    weather: Option<WeatherPoller>,
    pipeline: Pipeline,
    tx: UnboundedSender<SchedulerEvent>,
    rx: UnboundedReceiver<SchedulerEvent>,
    pending: usize,
}

impl Scheduler {
    pub fn new(service: Service, pipeline: Pipeline) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { service, calendar: None, weather: None, pipeline, tx, rx, pending: 0 }
    }

    pub fn with_calendar(mut self, poller: CalendarPoller) -> Self {
        self.calendar = Some(poller);
        self
    }

    pub fn with_weather(mut self, poller: WeatherPoller) -> Self {
        self.weather = Some(poller);
        self
    }

    pub fn phase(&self) -> Phase {
        self.pipeline.phase()
    }

    /// Polls and encodes started but not yet handled.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn spawn(self) -> JoinHandle<()> {
        task::spawn(self.run())
    }

    pub async fn run(mut self) {
        let tick = self.service.config.scheduler.tick();
        info!(tick_ms = tick.as_millis() as u64, "scheduler started");
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                Some(event) = self.rx.recv() => self.handle(event),
            }
        }
    }

    /// Cheap checks only; anything slow is handed off.
    pub fn tick(&mut self) {
        self.service.apply(&Update::Clock(self.service.read_clock()));
        self.poll_calendar();
        self.poll_weather();
        self.advance_pipeline();
    }

    pub fn handle(&mut self, event: SchedulerEvent) {
        self.pending = self.pending.saturating_sub(1);
        let now = self.service.now_utc();
        match event {
            SchedulerEvent::Calendar(result) => {
                if let Some(poller) = self.calendar.as_mut() {
                    poller.finish(now, result.is_ok());
                }
                match result {
                    Ok(buckets) => {
                        self.service.status.clear(Source::Calendar);
                        self.service.apply(&Update::Calendar(buckets));
                    }
                    Err(e) => {
                        warn!("calendar poll failed, keeping previous events: {e}");
                        self.service.status.record_error(Source::Calendar, &e);
                    }
                }
            }
            SchedulerEvent::Weather(result) => {
                if let Some(poller) = self.weather.as_mut() {
                    poller.finish(now, result.is_ok());
                }
                match result {
                    Ok(signal) => {
                        self.service.status.clear(Source::Weather);
                        self.service.apply(&Update::Weather(signal));
                    }
                    Err(e) => {
                        warn!("weather poll failed, keeping previous flags: {e}");
                        self.service.status.record_error(Source::Weather, &e);
                    }
                }
            }
            SchedulerEvent::Encoded(encoded) => {
                let failed = encoded.result.is_err();
                self.pipeline.complete(&self.service, encoded);
                if failed {
                    // retried on the next tick, not in a tight loop
                    return;
                }
            }
        }
        self.advance_pipeline();
    }

    /// Handles events until no poll or encode is outstanding.
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            match self.rx.recv().await {
                Some(event) => self.handle(event),
                None => break,
            }
        }
    }

    fn poll_calendar(&mut self) {
        let local_now = self.service.now().naive_local();
        let now = self.service.now_utc();
        let Some(poller) = self.calendar.as_mut() else { return };
        if !poller.is_due(now) {
            return;
        }
        let (source, name) = poller.begin(now);
        let tx = self.tx.clone();
        self.pending += 1;
        task::spawn(async move {
            let result = task::spawn_blocking(move || calendar::fetch_today(source.as_ref(), &name, local_now))
                .await
                .unwrap_or_else(|e| Err(CalendarError::Unavailable(format!("calendar worker: {e}"))));
            let _ = tx.send(SchedulerEvent::Calendar(result));
        });
    }

    fn poll_weather(&mut self) {
        let now = self.service.now_utc();
        let Some(poller) = self.weather.as_mut() else { return };
        if !poller.is_due(now) {
            return;
        }
        let client = poller.begin(now);
        let tx = self.tx.clone();
        self.pending += 1;
        task::spawn(async move {
            // a panicking fetch must still clear the in-flight flag
            let result = task::spawn(async move { client.fetch().await })
                .await
                .unwrap_or_else(|e| Err(WeatherError::Worker(e.to_string())));
            let _ = tx.send(SchedulerEvent::Weather(result));
        });
    }

    fn advance_pipeline(&mut self) {
        let Some(job) = self.pipeline.begin(&self.service) else { return };
        let version = job.version;
        let snapshot_path = self.pipeline.snapshot_path().map(|p| p.to_path_buf());
        let tx = self.tx.clone();
        self.pending += 1;
        task::spawn(async move {
            let encoded = task::spawn_blocking(move || pipeline::run_encode(job, snapshot_path.as_deref()))
                .await
                .unwrap_or_else(|e| Encoded { version, result: Err(EncodeError::Worker(e.to_string())) });
            let _ = tx.send(SchedulerEvent::Encoded(encoded));
        });
    }
}

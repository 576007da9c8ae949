/*!
Test harness for the kitchen kernel

Wires a complete `Service` + `Scheduler` around a manual clock, a stub
render surface and a stub calendar, so a test can drive ticks by hand and
assert on what got rendered and published.
*/

use crate::calendar_stub::StubCalendar;
use crate::surface_stub::StubSurface;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use kitchen_kernel::calendar::CalendarPoller;
use kitchen_kernel::clock::ManualClock;
use kitchen_kernel::config::KitchenConfig;
use kitchen_kernel::http::build_router;
use kitchen_kernel::models::{Artifact, DisplayState};
use kitchen_kernel::pipeline::{Phase, Pipeline};
use kitchen_kernel::scheduler::Scheduler;
use kitchen_kernel::weather::{WeatherClient, WeatherPoller};
use kitchen_kernel::Service;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestHarness {
    pub clock: Arc<ManualClock>,
    pub surface: Arc<StubSurface>,
    pub calendar: Arc<StubCalendar>,
    pub service: Service,
    pub scheduler: Scheduler,
}

impl TestHarness {
    /// Monday 2024-01-01 08:00 local, calendar wired, weather off.
    pub fn new() -> Result<Self> {
        Self::with_config(Self::base_config(), monday_morning()?)
    }

    /// Same as [`TestHarness::new`] with weather polling pointed at `url`.
    pub fn with_weather(url: &str) -> Result<Self> {
        let mut config = Self::base_config();
        config.weather.enabled = true;
        config.weather.url = url.to_string();
        config.weather.timeout_secs = 2;
        Self::with_config(config, monday_morning()?)
    }

    /// Small frame, no snapshot file, no network.
    pub fn base_config() -> KitchenConfig {
        let mut config = KitchenConfig::default();
        config.render.width = 64;
        config.render.height = 36;
        config.render.snapshot_path = None;
        config.weather.enabled = false;
        config
    }

    pub fn with_config(config: KitchenConfig, start: DateTime<Local>) -> Result<Self> {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let clock = Arc::new(ManualClock::new(start));
        let surface = Arc::new(StubSurface::new());
        let calendar = Arc::new(StubCalendar::new());
        let service = Service::new(config.clone(), clock.clone());

        let pipeline = Pipeline::new(surface.clone(), config.render.size())
            .with_snapshot_path(config.render.snapshot_path.clone());
        let mut scheduler = Scheduler::new(service.clone(), pipeline);
        if config.calendar.enabled {
            scheduler = scheduler.with_calendar(CalendarPoller::new(calendar.clone(), &config.calendar));
        }
        if config.weather.enabled {
            let client = WeatherClient::new(&config.weather)?;
            scheduler = scheduler.with_weather(WeatherPoller::new(Arc::new(client), &config.weather));
        }
        tracing::debug!(start = %start, "test harness ready");

        Ok(Self { clock, surface, calendar, service, scheduler })
    }

    /// One scheduler tick, then wait until every poll and encode it started is handled.
    pub async fn tick(&mut self) {
        self.scheduler.tick();
        self.scheduler.settle().await;
    }

    pub fn advance(&self, by: TimeDelta) {
        self.clock.advance(by);
    }

    pub async fn advance_and_tick(&mut self, by: TimeDelta) {
        self.advance(by);
        self.tick().await;
    }

    pub fn state(&self) -> DisplayState {
        self.service.display_snapshot()
    }

    pub fn published(&self) -> Arc<Artifact> {
        self.service.artifacts.snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    /// Serves the polling API on a loopback port; returns its base URL.
    pub async fn serve(&self) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(self.service.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("harness server stopped: {e}");
            }
        });
        Ok(format!("http://{addr}"))
    }
}

fn monday_morning() -> Result<DateTime<Local>> {
    Local
        .with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("2024-01-01 08:00 is not a single local time"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar_stub::EventBuilder;
    use crate::forecast_stub::ForecastStub;
    use axum::http::StatusCode;
    use chrono::NaiveDate;
    use kitchen_kernel::models::{Version, WeatherSignal};
    use kitchen_kernel::tracker::Update;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn day() -> EventBuilder {
        EventBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[tokio::test]
    async fn test_first_tick_converges() {
        let mut h = TestHarness::new().unwrap();
        h.calendar.set_events(vec![day().all_day("Holiday"), day().timed("Standup", 9, 30), day().timed("Lunch", 14, 0)]);
        assert!(h.published().is_empty());

        h.tick().await;

        let state = h.state();
        assert_eq!(state.weekday_label, "Måndag");
        assert_eq!(state.date_label, "1");
        assert_eq!(state.morning_events, vec!["Holiday".to_string(), "09:30  Standup".to_string()]);
        assert_eq!(state.afternoon_events, vec!["14:00  Lunch".to_string()]);
        assert_eq!(h.phase(), Phase::Clean);
        assert_eq!(h.published().version, state.version);
        assert!(h.published().image.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn test_identical_input_does_not_rerender() {
        let mut h = TestHarness::new().unwrap();
        h.calendar.set_events(vec![day().timed("Standup", 9, 30)]);
        h.tick().await;
        let first = h.published();
        let captures = h.surface.capture_count();

        for _ in 0..3 {
            h.advance_and_tick(TimeDelta::hours(1)).await;
        }

        assert_eq!(h.calendar.calls(), 4);
        assert_eq!(h.surface.capture_count(), captures);
        assert_eq!(h.published().version, first.version);
        assert_eq!(h.published().image, first.image);
    }

    #[tokio::test]
    async fn test_midnight_rolls_labels_and_rerenders() {
        let mut h = TestHarness::new().unwrap();
        h.calendar.set_events(vec![day().timed("Standup", 9, 30)]);
        h.tick().await;
        let captures = h.surface.capture_count();

        h.advance_and_tick(TimeDelta::hours(16) + TimeDelta::seconds(5)).await;

        let state = h.state();
        assert_eq!(state.weekday_label, "Tisdag");
        assert_eq!(state.date_label, "2");
        assert!(state.morning_events.is_empty());
        assert!(h.surface.capture_count() > captures);
        assert_eq!(h.published().version, state.version);
    }

    #[tokio::test]
    async fn test_change_during_encode_converges() {
        let mut h = TestHarness::new().unwrap();
        h.scheduler.tick();
        let in_flight = h.state().version;

        // lands while the first encode is still on the blocking pool
        h.advance(TimeDelta::seconds(1));
        assert!(h.service.apply(&Update::Weather(WeatherSignal { needs_sunscreen: true, needs_raingear: false })));
        h.scheduler.settle().await;

        let captured = h.surface.captured();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0], in_flight);
        assert!(captured[1] > in_flight);
        assert_eq!(h.published().version, h.state().version);
        assert_eq!(h.phase(), Phase::Clean);
    }

    #[tokio::test]
    async fn test_encode_failure_keeps_old_artifact_and_retries_next_tick() {
        let mut h = TestHarness::new().unwrap();
        h.tick().await;
        let good = h.published();

        h.surface.corrupt_next(1);
        h.calendar.set_events(vec![day().timed("Standup", 9, 30)]);
        h.advance_and_tick(TimeDelta::hours(1)).await;

        assert_eq!(h.phase(), Phase::Dirty);
        assert_eq!(h.published().version, good.version);
        assert_eq!(h.published().image, good.image);
        assert!(h.service.status.label().contains("bild"));
        assert_eq!(h.service.status.snapshot().render_failures, 1);

        h.advance_and_tick(TimeDelta::seconds(1)).await;
        assert_eq!(h.phase(), Phase::Clean);
        assert_eq!(h.published().version, h.state().version);
        assert!(!h.service.status.label().contains("bild"));
    }

    #[tokio::test]
    async fn test_capture_failure_retries_next_tick() {
        let mut config = TestHarness::base_config();
        config.calendar.enabled = false;
        let mut h = TestHarness::with_config(config, monday_morning().unwrap()).unwrap();
        h.surface.fail_next(1);
        h.tick().await;
        assert_eq!(h.published().version, Version::NEVER);
        assert_eq!(h.phase(), Phase::Dirty);

        h.advance_and_tick(TimeDelta::seconds(1)).await;
        assert_eq!(h.published().version, h.state().version);
    }

    #[tokio::test]
    async fn test_calendar_denied_keeps_events_and_reports() {
        let mut h = TestHarness::new().unwrap();
        h.calendar.set_events(vec![day().timed("Standup", 9, 30)]);
        h.tick().await;
        let version = h.state().version;

        h.calendar.set_denied(true);
        h.advance_and_tick(TimeDelta::hours(1)).await;

        assert_eq!(h.state().morning_events, vec!["09:30  Standup".to_string()]);
        assert_eq!(h.state().version, version);
        assert!(h.service.status.label().contains("kalender"));

        h.calendar.set_denied(false);
        h.advance_and_tick(TimeDelta::hours(1)).await;
        assert!(!h.service.status.label().contains("kalender"));
    }

    #[tokio::test]
    async fn test_weather_flags_and_cooldown() {
        let stub = ForecastStub::start().await.unwrap();
        stub.set_forecast(3.0, 10.0);
        let mut h = TestHarness::with_weather(&stub.url()).unwrap();

        h.tick().await;
        let state = h.state();
        assert!(state.needs_sunscreen);
        assert!(state.needs_raingear);
        assert_eq!(stub.hits(), 1);

        stub.set_forecast(2.9, 9.9);
        h.advance_and_tick(TimeDelta::minutes(59)).await;
        assert_eq!(stub.hits(), 1);
        assert!(h.state().needs_sunscreen);

        h.advance_and_tick(TimeDelta::minutes(1)).await;
        assert_eq!(stub.hits(), 2);
        assert!(!h.state().needs_sunscreen);
        assert!(!h.state().needs_raingear);
    }

    #[tokio::test]
    async fn test_weather_outage_backs_off() {
        let stub = ForecastStub::start().await.unwrap();
        stub.set_reply(StatusCode::TOO_MANY_REQUESTS, "slow down");
        let mut h = TestHarness::with_weather(&stub.url()).unwrap();
        let retry = TimeDelta::seconds(h.service.config.weather.retry_secs as i64);

        h.tick().await;
        assert_eq!(stub.hits(), 1);
        assert!(h.service.status.label().contains("väder"));

        // a minute of one-second ticks during the outage
        for _ in 0..60 {
            h.advance_and_tick(TimeDelta::seconds(1)).await;
        }
        assert_eq!(stub.hits(), 1);

        h.advance_and_tick(retry - TimeDelta::seconds(60)).await;
        assert_eq!(stub.hits(), 2);

        // recovery is picked up after the next back-off, well before the hour
        stub.set_forecast(8.0, 0.0);
        h.advance_and_tick(retry).await;
        assert_eq!(stub.hits(), 3);
        assert!(h.state().needs_sunscreen);
        assert!(!h.service.status.label().contains("väder"));
    }

    #[tokio::test]
    async fn test_polling_api_reflects_published_artifact() {
        let mut h = TestHarness::new().unwrap();
        let base = h.serve().await.unwrap();
        let http = reqwest::Client::new();

        let before = http.get(format!("{base}/image")).send().await.unwrap();
        assert_eq!(before.status(), 200);
        assert!(before.bytes().await.unwrap().is_empty());

        h.tick().await;
        let image = http.get(format!("{base}/image")).send().await.unwrap().bytes().await.unwrap();
        assert_eq!(image, h.published().image);

        let body = http.get(format!("{base}/last_changed")).send().await.unwrap().text().await.unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some(h.state().version.to_epoch_string().as_str()));
        // 08:00 -> next day's 00:10
        assert_eq!(lines.next(), Some("58200"));

        let again = http.get(format!("{base}/last_changed")).send().await.unwrap().text().await.unwrap();
        assert_eq!(again, body);
    }

    #[tokio::test]
    async fn test_battery_report_only_touches_status() {
        let mut h = TestHarness::new().unwrap();
        let base = h.serve().await.unwrap();
        h.tick().await;
        let captures = h.surface.capture_count();

        let resp = reqwest::get(format!("{base}/last_changed?battery=3.91V")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(h.service.status.label().contains("3.91V"));

        h.advance_and_tick(TimeDelta::seconds(1)).await;
        assert_eq!(h.surface.capture_count(), captures);
        assert_eq!(h.phase(), Phase::Clean);

        // shows up in the footer with the next real change
        h.service.apply(&Update::Weather(WeatherSignal { needs_sunscreen: true, needs_raingear: false }));
        h.advance_and_tick(TimeDelta::seconds(1)).await;
        assert_eq!(h.surface.capture_count(), captures + 1);
        assert_eq!(h.surface.last_status().as_deref(), Some("batteri 3.91V"));
    }
}

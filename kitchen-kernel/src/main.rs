/**
 * KITCHEN KERNEL - entry point of the kitchen panel server
 *
 * ROLE: wires config, clock, calendar + weather pollers, the render/encode
 * pipeline and the polling HTTP API, then serves until killed.
 */

use anyhow::Context;
use kitchen_kernel::calendar::{CalendarPoller, JsonFileCalendarSource};
use kitchen_kernel::clock::SystemClock;
use kitchen_kernel::config::load_config;
use kitchen_kernel::http;
use kitchen_kernel::pipeline::Pipeline;
use kitchen_kernel::render::PanelSurface;
use kitchen_kernel::scheduler::Scheduler;
use kitchen_kernel::weather::{WeatherClient, WeatherPoller};
use kitchen_kernel::Service;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kitchen_kernel=info")),
        )
        .init();

    let cfg = load_config().await;
    let service = Service::new(cfg.clone(), Arc::new(SystemClock));

    let pipeline = Pipeline::new(Arc::new(PanelSurface), cfg.render.size())
        .with_snapshot_path(cfg.render.snapshot_path.clone());
    let mut scheduler = Scheduler::new(service.clone(), pipeline);

    if cfg.calendar.enabled {
        info!("calendar `{}` from {}", cfg.calendar.name, cfg.calendar.source.display());
        let source = Arc::new(JsonFileCalendarSource::new(cfg.calendar.source.clone()));
        scheduler = scheduler.with_calendar(CalendarPoller::new(source, &cfg.calendar));
    } else {
        warn!("calendar disabled");
    }

    if cfg.weather.enabled {
        match WeatherClient::new(&cfg.weather) {
            Ok(client) => {
                scheduler = scheduler.with_weather(WeatherPoller::new(Arc::new(client), &cfg.weather));
            }
            Err(e) => error!("weather disabled, cannot build HTTP client: {e}"),
        }
    } else {
        warn!("weather disabled");
    }

    let addr = SocketAddr::new(cfg.server.bind, cfg.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    let scheduler = scheduler.spawn();
    info!("listening on http://{addr}");
    http::serve(listener, service, scheduler).await.context("kitchen kernel stopped")?;
    Ok(())
}

/**
 * POLLING API - what the e-paper client talks to
 *
 * ROUTES:
 * - GET /image          latest published PNG (empty body until the first render)
 * - GET /last_changed   "<published version, epoch secs>\n<secs until next refresh>"
 *                       optional ?battery=<string>, shown in the status footer
 * - anything else       404 "Not Found"
 *
 * Handlers only read snapshots; none of them waits on a render in flight.
 * serve() returns as soon as the scheduler task ends, panic or not.
 */

use crate::service::Service;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::future::IntoFuture;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("http server failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("scheduler task died: {0}")]
    Scheduler(#[from] JoinError),
    #[error("scheduler task returned")]
    SchedulerStopped,
}

#[derive(Debug, Deserialize)]
struct LastChangedParams {
    battery: Option<String>,
}

pub fn build_router(service: Service) -> Router {
    Router::new()
        .route("/image", get(get_image))
        .route("/last_changed", get(get_last_changed))
        .fallback(not_found)
        .with_state(service)
}

/// Serves the API until either the listener or the scheduler task ends.
pub async fn serve(
    listener: TcpListener,
    service: Service,
    scheduler: JoinHandle<()>,
) -> Result<(), ServeError> {
    let app = build_router(service);
    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served?;
            Ok(())
        }
        joined = scheduler => {
            let err = match joined {
                Ok(()) => ServeError::SchedulerStopped,
                Err(e) => ServeError::Scheduler(e),
            };
            tracing::error!("{err}, shutting down");
            Err(err)
        }
    }
}

// GET /image
async fn get_image(State(svc): State<Service>) -> impl IntoResponse {
    let artifact = svc.artifacts.snapshot();
    ([(header::CONTENT_TYPE, "image/png")], artifact.image.clone())
}

// GET /last_changed?battery=3.91
async fn get_last_changed(
    State(svc): State<Service>,
    Query(params): Query<LastChangedParams>,
) -> impl IntoResponse {
    if let Some(battery) = params.battery {
        tracing::debug!(%battery, "client battery report");
        svc.status.set_battery(battery);
    }
    let version = svc.artifacts.published_version();
    let body = format!("{}\n{}", version.to_epoch_string(), svc.refresh_in_seconds());
    ([(header::CONTENT_TYPE, "text/plain")], body)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/*!
Forecast service stub

A loopback axum server answering `/v1/forecast` with whatever status and
body the test last configured. Counts hits and keeps the last query string.
*/

use anyhow::Result;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::debug;

#[derive(Debug)]
struct Reply {
    status: StatusCode,
    body: String,
}

#[derive(Debug)]
struct Inner {
    reply: Mutex<Reply>,
    last_query: Mutex<Option<String>>,
    hits: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct ForecastStub {
    inner: Arc<Inner>,
    addr: SocketAddr,
}

/// Minimal Open-Meteo daily body for one day.
pub fn forecast_json(uv_index_max: f64, rain_sum: f64) -> String {
    json!({
        "latitude": 59.33,
        "longitude": 18.07,
        "daily_units": { "uv_index_max": "", "rain_sum": "mm" },
        "daily": {
            "time": ["2024-01-01"],
            "uv_index_max": [uv_index_max],
            "rain_sum": [rain_sum]
        }
    })
    .to_string()
}

async fn answer(State(inner): State<Arc<Inner>>, RawQuery(query): RawQuery) -> impl IntoResponse {
    inner.hits.fetch_add(1, Ordering::SeqCst);
    *inner.last_query.lock() = query;
    let reply = inner.reply.lock();
    debug!(status = reply.status.as_u16(), "forecast stub answering");
    (reply.status, reply.body.clone())
}

impl ForecastStub {
    /// Binds 127.0.0.1 on a free port; starts out answering a calm day.
    pub async fn start() -> Result<Self> {
        let inner = Arc::new(Inner {
            reply: Mutex::new(Reply { status: StatusCode::OK, body: forecast_json(0.0, 0.0) }),
            last_query: Mutex::new(None),
            hits: AtomicUsize::new(0),
        });
        let app = Router::new().route("/v1/forecast", get(answer)).with_state(inner.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("forecast stub stopped: {e}");
            }
        });
        Ok(Self { inner, addr })
    }

    pub fn url(&self) -> String {
        format!("http://{}/v1/forecast", self.addr)
    }

    pub fn set_forecast(&self, uv_index_max: f64, rain_sum: f64) {
        self.set_reply(StatusCode::OK, forecast_json(uv_index_max, rain_sum));
    }

    pub fn set_reply(&self, status: StatusCode, body: impl Into<String>) {
        *self.inner.reply.lock() = Reply { status, body: body.into() };
    }

    pub fn hits(&self) -> usize {
        self.inner.hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.inner.last_query.lock().clone()
    }
}

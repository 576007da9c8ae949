//! Weather poller: one forecast GET, two display flags.
//!
//! Only today's maximum UV index and summed rainfall drive the panel:
//! sunscreen from UV 3 and up, rain gear from 10 mm and up.

use crate::config::WeatherConf;
use crate::models::WeatherSignal;
use crate::poller::Cooldown;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub const SUNSCREEN_UV_INDEX: f64 = 3.0;
pub const RAINGEAR_RAIN_MM: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("forecast request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("forecast service answered HTTP {0}")]
    Status(u16),
    #[error("forecast body malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("forecast has no value for {0}")]
    MissingField(&'static str),
    #[error("forecast task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Deserialize)]
struct Forecast {
    daily: Daily,
}

#[derive(Debug, Deserialize)]
struct Daily {
    #[serde(default)]
    uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    rain_sum: Vec<Option<f64>>,
}

pub fn derive_signal(uv_index_max: f64, rain_sum_mm: f64) -> WeatherSignal {
    WeatherSignal {
        needs_sunscreen: uv_index_max >= SUNSCREEN_UV_INDEX,
        needs_raingear: rain_sum_mm >= RAINGEAR_RAIN_MM,
    }
}

pub fn parse_forecast(body: &[u8]) -> Result<WeatherSignal, WeatherError> {
    let forecast: Forecast = serde_json::from_slice(body)?;
    let uv = forecast.daily.uv_index_max.first().copied().flatten()
        .ok_or(WeatherError::MissingField("daily.uv_index_max[0]"))?;
    let rain = forecast.daily.rain_sum.first().copied().flatten()
        .ok_or(WeatherError::MissingField("daily.rain_sum[0]"))?;
    Ok(derive_signal(uv, rain))
}

/// HTTP binding to an Open-Meteo style forecast endpoint.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    url: String,
    query: Vec<(&'static str, String)>,
}

impl WeatherClient {
    pub fn new(conf: &WeatherConf) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .timeout(conf.timeout())
            .user_agent(concat!("kitchen-kernel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let query = vec![
            ("latitude", conf.latitude.to_string()),
            ("longitude", conf.longitude.to_string()),
            ("daily", "uv_index_max,rain_sum".to_string()),
            ("timezone", conf.timezone.clone()),
            ("forecast_days", "1".to_string()),
        ];
        Ok(Self { http, url: conf.url.clone(), query })
    }

    pub async fn fetch(&self) -> Result<WeatherSignal, WeatherError> {
        let response = self.http.get(&self.url).query(&self.query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_forecast(&body)
    }
}

pub struct WeatherPoller {
    client: Arc<WeatherClient>,
    gate: Cooldown,
}

impl WeatherPoller {
    pub fn new(client: Arc<WeatherClient>, conf: &WeatherConf) -> Self {
        Self { client, gate: Cooldown::new(conf.interval(), conf.cooldown).with_retry(conf.retry()) }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.gate.is_due(now)
    }

    pub fn begin(&mut self, now: DateTime<Utc>) -> Arc<WeatherClient> {
        self.gate.start(now);
        self.client.clone()
    }

    pub fn finish(&mut self, now: DateTime<Utc>, success: bool) {
        self.gate.finish(now, success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    fn body(uv: f64, rain: f64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "latitude": 59.33,
            "daily": { "time": ["2024-01-01"], "uv_index_max": [uv], "rain_sum": [rain] }
        })).unwrap()
    }

    #[test]
    fn test_thresholds() {
        assert!(parse_forecast(&body(3.0, 0.0)).unwrap().needs_sunscreen);
        assert!(!parse_forecast(&body(2.9, 0.0)).unwrap().needs_sunscreen);
        assert!(parse_forecast(&body(0.0, 10.0)).unwrap().needs_raingear);
        assert!(!parse_forecast(&body(0.0, 9.9)).unwrap().needs_raingear);
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(parse_forecast(b"not json"), Err(WeatherError::Json(_))));
        assert!(matches!(parse_forecast(br#"{"hourly": {}}"#), Err(WeatherError::Json(_))));
        assert!(matches!(
            parse_forecast(br#"{"daily": {"uv_index_max": [], "rain_sum": [1.0]}}"#),
            Err(WeatherError::MissingField("daily.uv_index_max[0]"))
        ));
        assert!(matches!(
            parse_forecast(br#"{"daily": {"uv_index_max": [4.0], "rain_sum": [null]}}"#),
            Err(WeatherError::MissingField("daily.rain_sum[0]"))
        ));
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/v1/forecast")
    }

    fn conf(url: String) -> WeatherConf {
        WeatherConf { url, timeout_secs: 2, ..WeatherConf::default() }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let payload = body(5.5, 12.0);
        let app = Router::new().route("/v1/forecast", get(move || {
            let payload = payload.clone();
            async move { payload }
        }));
        let client = WeatherClient::new(&conf(serve(app).await)).unwrap();
        let signal = client.fetch().await.unwrap();
        assert_eq!(signal, WeatherSignal { needs_sunscreen: true, needs_raingear: true });
    }

    #[tokio::test]
    async fn test_fetch_non_2xx() {
        let app = Router::new().route(
            "/v1/forecast",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let client = WeatherClient::new(&conf(serve(app).await)).unwrap();
        assert!(matches!(client.fetch().await, Err(WeatherError::Status(503))));
    }

    #[tokio::test]
    async fn test_fetch_transport_error() {
        let client = WeatherClient::new(&conf("http://127.0.0.1:1/v1/forecast".into())).unwrap();
        assert!(matches!(client.fetch().await, Err(WeatherError::Transport(_))));
    }
}

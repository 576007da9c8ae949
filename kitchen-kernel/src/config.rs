use crate::clock::FirstWeekday;
use crate::poller::CooldownPolicy;
use crate::render::FrameSize;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KitchenConfig {
    pub server: ServerConf,
    pub scheduler: SchedulerConf,
    pub render: RenderConf,
    pub display: DisplayConf,
    pub calendar: CalendarConf,
    pub weather: WeatherConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConf {
    pub bind: IpAddr,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConf {
    pub tick_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConf {
    pub width: u32,
    pub height: u32,
    /// Every published PNG is also written here, e.g. for a local preview.
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConf {
    pub first_weekday: FirstWeekday,
    /// Local time of day the client is told to come back at.
    #[serde(with = "hhmm")]
    pub refresh_at: NaiveTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CalendarConf {
    pub enabled: bool,
    /// Only events of the calendar with this title are shown.
    pub name: String,
    pub source: PathBuf,
    /// Counted from the previous poll, not from the clock hour. After midnight
    /// the new day's events can take up to this long to appear, so keep it
    /// well under the gap between midnight and `display.refresh_at` when the
    /// 00:10 image has to show today's calendar.
    pub interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WeatherConf {
    pub enabled: bool,
    pub url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub cooldown: CooldownPolicy,
    /// Back-off after a failed fetch, capped at `interval_secs`.
    pub retry_secs: u64,
}

impl Default for ServerConf {
    fn default() -> Self {
        Self { bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 8123 }
    }
}

impl Default for SchedulerConf {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

impl Default for RenderConf {
    fn default() -> Self {
        Self { width: 960, height: 540, snapshot_path: None }
    }
}

impl Default for DisplayConf {
    fn default() -> Self {
        Self {
            first_weekday: FirstWeekday::default(),
            refresh_at: NaiveTime::from_hms_opt(0, 10, 0).unwrap_or_default(),
        }
    }
}

impl Default for CalendarConf {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "Delad".into(),
            source: PathBuf::from("calendar.json"),
            interval_secs: 3600,
        }
    }
}

impl Default for WeatherConf {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://api.open-meteo.com/v1/forecast".into(),
            latitude: 59.33,
            longitude: 18.07,
            timezone: "Europe/Stockholm".into(),
            interval_secs: 3600,
            timeout_secs: 10,
            cooldown: CooldownPolicy::AfterSuccess,
            retry_secs: 300,
        }
    }
}

impl SchedulerConf {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl RenderConf {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

impl CalendarConf {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl WeatherConf {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

impl KitchenConfig {
    pub fn from_yaml(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: KitchenConfig = serde_yaml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("scheduler.tick_ms", self.scheduler.tick_ms),
            ("render.width", u64::from(self.render.width)),
            ("render.height", u64::from(self.render.height)),
            ("calendar.interval_secs", self.calendar.interval_secs),
            ("weather.interval_secs", self.weather.interval_secs),
            ("weather.timeout_secs", self.weather.timeout_secs),
            ("weather.retry_secs", self.weather.retry_secs),
        ];
        match checks.iter().find(|(_, v)| *v == 0) {
            Some((name, _)) => Err(ConfigError::Zero(name)),
            None => Ok(()),
        }
    }
}

/// Loads `$KITCHEN_CONFIG` (default `kitchen.yaml`), falling back to defaults.
/// `KITCHEN_PORT` overrides the listening port.
pub async fn load_config() -> KitchenConfig {
    let path = std::env::var("KITCHEN_CONFIG").unwrap_or_else(|_| "kitchen.yaml".into());
    let mut cfg = load_from(Path::new(&path)).await;
    if let Ok(port) = std::env::var("KITCHEN_PORT") {
        match port.parse() {
            Ok(p) => cfg.server.port = p,
            Err(e) => tracing::warn!("ignoring KITCHEN_PORT={port}: {e}"),
        }
    }
    cfg
}

pub async fn load_from(path: &Path) -> KitchenConfig {
    if !path.exists() {
        tracing::warn!("no {}, using default config", path.display());
        return KitchenConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            tracing::warn!("cannot read {}: {e}, using default config", path.display());
            return KitchenConfig::default();
        }
    };
    KitchenConfig::from_yaml(&txt).unwrap_or_else(|e| {
        tracing::error!("invalid config {}: {e}", path.display());
        KitchenConfig::default()
    })
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .map_err(|e| D::Error::custom(format!("refresh_at `{raw}`: {e}")))
    }
}

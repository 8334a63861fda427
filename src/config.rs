use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Display name of the monitored stop, matched case-insensitively as a
    /// substring against stop names in the static dataset.
    pub target_stop_name: String,
    /// Request key under which the stop is served (`/api/arrivals/{stop_key}`).
    pub stop_key: String,
    /// GTFS feed endpoints
    #[serde(default)]
    pub feeds: FeedConfig,
    /// Address the HTTP server binds to.
    #[serde(default = "Config::default_listen_addr")]
    pub listen_addr: String,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
    /// Consumer-side watch settings
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// URL of the static GTFS ZIP (stops.txt, routes.txt).
    #[serde(default = "FeedConfig::default_static_url")]
    pub static_url: String,
    /// URL of the GTFS-RT trip-updates protobuf.
    #[serde(default = "FeedConfig::default_trip_updates_url")]
    pub trip_updates_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            static_url: Self::default_static_url(),
            trip_updates_url: Self::default_trip_updates_url(),
        }
    }
}

impl FeedConfig {
    fn default_static_url() -> String {
        "https://gtfs.sofiatraffic.bg/api/v1/static".to_string()
    }
    fn default_trip_updates_url() -> String {
        "https://gtfs.sofiatraffic.bg/api/v1/trip-updates".to_string()
    }
}

/// Configuration for the `watch` consumer binary.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Base URL of the arrivals API (default: local server).
    #[serde(default = "WatchConfig::default_base_url")]
    pub base_url: String,
    /// Interval in seconds between polls (default: 15)
    #[serde(default = "WatchConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Walking time to the stop in minutes (default: 7)
    #[serde(default = "WatchConfig::default_walk_minutes")]
    pub walk_minutes: i64,
    /// Safety buffer in minutes on top of the walk (default: 2)
    #[serde(default = "WatchConfig::default_buffer_minutes")]
    pub buffer_minutes: i64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            interval_secs: Self::default_interval_secs(),
            walk_minutes: Self::default_walk_minutes(),
            buffer_minutes: Self::default_buffer_minutes(),
        }
    }
}

impl WatchConfig {
    fn default_base_url() -> String {
        "http://localhost:4000".to_string()
    }
    fn default_interval_secs() -> u64 {
        15
    }
    fn default_walk_minutes() -> i64 {
        7
    }
    fn default_buffer_minutes() -> i64 {
        2
    }
}

impl Config {
    fn default_listen_addr() -> String {
        "0.0.0.0:4000".to_string()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

//! Server configuration loading from file and environment variables.

use eventlease_types::{
    Clamp, DEFAULT_FETCH_LIMIT, DEFAULT_LEASE_DURATION_SECS, MAX_FETCH_LIMIT,
    MAX_LEASE_DURATION_SECS, MIN_LEASE_DURATION_SECS,
};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Lease and fetch bounds.
    #[serde(default)]
    pub leases: LeaseConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "eventlease_lease=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Bounds applied to lease requests before they reach the coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseConfig {
    /// Lease duration used when the request omits one.
    #[serde(default = "default_lease_duration")]
    pub default_duration_secs: i64,

    /// Shortest lease granted.
    #[serde(default = "default_min_lease_duration")]
    pub min_duration_secs: i64,

    /// Longest lease granted.
    #[serde(default = "default_max_lease_duration")]
    pub max_duration_secs: i64,

    /// Events returned per lease call when the request omits `limit`.
    #[serde(default = "default_fetch_limit")]
    pub default_fetch_limit: i64,

    /// Upper bound on events returned per lease call.
    #[serde(default = "default_max_fetch_limit")]
    pub max_fetch_limit: i64,

    /// Seconds between sweeps of expired leases. `0` disables the sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl LeaseConfig {
    /// Range applied to `leaseDurationSeconds`.
    pub fn duration_clamp(&self) -> Clamp {
        Clamp {
            default: self.default_duration_secs,
            min: self.min_duration_secs,
            max: self.max_duration_secs,
        }
    }

    /// Range applied to `limit`.
    pub fn fetch_limit_clamp(&self) -> Clamp {
        Clamp {
            default: self.default_fetch_limit,
            min: 1,
            max: self.max_fetch_limit,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let duration = self.duration_clamp();
        if duration.min <= 0 || !duration.is_consistent() {
            return Err(ConfigError::Invalid(format!(
                "leases: need 0 < min_duration_secs <= default_duration_secs <= max_duration_secs, got {}/{}/{}",
                duration.min, duration.default, duration.max
            )));
        }
        let limit = self.fetch_limit_clamp();
        if !limit.is_consistent() {
            return Err(ConfigError::Invalid(format!(
                "leases: need 1 <= default_fetch_limit <= max_fetch_limit, got {}/{}",
                limit.default, limit.max
            )));
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "eventlease.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lease_duration() -> i64 {
    DEFAULT_LEASE_DURATION_SECS
}

fn default_min_lease_duration() -> i64 {
    MIN_LEASE_DURATION_SECS
}

fn default_max_lease_duration() -> i64 {
    MAX_LEASE_DURATION_SECS
}

fn default_fetch_limit() -> i64 {
    DEFAULT_FETCH_LIMIT
}

fn default_max_fetch_limit() -> i64 {
    MAX_FETCH_LIMIT
}

fn default_sweep_interval() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_lease_duration(),
            min_duration_secs: default_min_lease_duration(),
            max_duration_secs: default_max_lease_duration(),
            default_fetch_limit: default_fetch_limit(),
            max_fetch_limit: default_max_fetch_limit(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EVENTLEASE_HOST` overrides `server.host`
/// - `EVENTLEASE_PORT` overrides `server.port`
/// - `EVENTLEASE_DB_PATH` overrides `database.path`
/// - `EVENTLEASE_LOG_LEVEL` overrides `logging.level`
/// - `EVENTLEASE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `EVENTLEASE_SWEEP_INTERVAL_SECS` overrides `leases.sweep_interval_secs`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the lease bounds are inconsistent.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("EVENTLEASE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("EVENTLEASE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("EVENTLEASE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("EVENTLEASE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("EVENTLEASE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(interval) = std::env::var("EVENTLEASE_SWEEP_INTERVAL_SECS") {
        if let Ok(parsed) = interval.parse() {
            config.leases.sweep_interval_secs = parsed;
        }
    }

    config.leases.validate()?;

    Ok(config)
}

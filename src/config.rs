use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::info;

use crate::clock::offset_from_minutes;
use crate::limits::{
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_REFRESH_INTERVAL_MS, MAX_UTC_OFFSET_MINUTES,
    MIN_REFRESH_INTERVAL_MS,
};
use crate::loader::LoadSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the room/reservation payloads.
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub offset: FixedOffset,
    /// Full board reload cadence; `None` loads once at startup.
    pub reload_interval: Option<Duration>,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("ROOMWATCH_DATA_DIR").unwrap_or_else(|| "./data".to_string());

        let refresh_ms: u64 = parse(&lookup, "ROOMWATCH_REFRESH_MS", DEFAULT_REFRESH_INTERVAL_MS)?;
        if refresh_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(invalid("ROOMWATCH_REFRESH_MS", refresh_ms));
        }

        let fetch_ms: u64 = parse(&lookup, "ROOMWATCH_FETCH_TIMEOUT_MS", DEFAULT_FETCH_TIMEOUT_MS)?;
        if fetch_ms == 0 {
            return Err(invalid("ROOMWATCH_FETCH_TIMEOUT_MS", fetch_ms));
        }

        let offset_minutes: i32 = parse(&lookup, "ROOMWATCH_UTC_OFFSET_MINUTES", 0)?;
        let offset = offset_from_minutes(offset_minutes)
            .filter(|_| offset_minutes.abs() <= MAX_UTC_OFFSET_MINUTES)
            .ok_or_else(|| invalid("ROOMWATCH_UTC_OFFSET_MINUTES", offset_minutes))?;

        let reload_secs: u64 = parse(&lookup, "ROOMWATCH_RELOAD_SECS", 0)?;
        let metrics_port = match lookup("ROOMWATCH_METRICS_PORT") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u16>()
                    .map_err(|_| invalid("ROOMWATCH_METRICS_PORT", &raw))?,
            ),
            None => None,
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            refresh_interval: Duration::from_millis(refresh_ms),
            fetch_timeout: Duration::from_millis(fetch_ms),
            offset,
            reload_interval: (reload_secs > 0).then(|| Duration::from_secs(reload_secs)),
            metrics_port,
        })
    }

    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            fetch_timeout: self.fetch_timeout,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => {
            info!("{key} not set, using default");
            Ok(default)
        }
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

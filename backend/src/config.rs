//! Runtime settings.
//!
//! Read from the environment after `.env` has been loaded (dotenvy). CLI
//! flags override individual values.
//!
//! | Variable             | Default              |
//! |----------------------|----------------------|
//! | `HCE_PORT`           | 3000                 |
//! | `HCE_MAX_UPLOAD_MB`  | 50                   |
//! | `HCE_CACHE_CAPACITY` | 16                   |
//! | `HCE_MAX_SESSIONS`   | 64                   |
//! | `HCE_CURRENT_YEAR`   | local calendar year  |

use chrono::Datelike;
use serde::Serialize;
use std::str::FromStr;

use crate::api::sessions::DEFAULT_MAX_SESSIONS;
use crate::cache::DEFAULT_CAPACITY;
use crate::error::ConfigError;
use crate::transform::CleanOptions;

pub const ENV_PORT: &str = "HCE_PORT";
pub const ENV_MAX_UPLOAD_MB: &str = "HCE_MAX_UPLOAD_MB";
pub const ENV_CACHE_CAPACITY: &str = "HCE_CACHE_CAPACITY";
pub const ENV_MAX_SESSIONS: &str = "HCE_MAX_SESSIONS";
pub const ENV_CURRENT_YEAR: &str = "HCE_CURRENT_YEAR";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Parsed uploads kept in the load cache
    pub cache_capacity: usize,
    /// Live sessions kept before the least recently used one is dropped
    pub max_sessions: usize,
    /// Fixed tenure year; `None` uses the local calendar year
    pub current_year: Option<i32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            cache_capacity: DEFAULT_CAPACITY,
            max_sessions: DEFAULT_MAX_SESSIONS,
            current_year: None,
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_upload_mb: Option<usize> = parse_var(&lookup, ENV_MAX_UPLOAD_MB)?;
        let cache_capacity = parse_positive(&lookup, ENV_CACHE_CAPACITY)?;
        let max_sessions = parse_positive(&lookup, ENV_MAX_SESSIONS)?;

        Ok(Self {
            port: parse_var(&lookup, ENV_PORT)?.unwrap_or(defaults.port),
            max_upload_bytes: max_upload_mb
                .map_or(defaults.max_upload_bytes, |mb| mb * 1024 * 1024),
            cache_capacity: cache_capacity.unwrap_or(defaults.cache_capacity),
            max_sessions: max_sessions.unwrap_or(defaults.max_sessions),
            current_year: parse_var(&lookup, ENV_CURRENT_YEAR)?,
        })
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_current_year(mut self, year: Option<i32>) -> Self {
        if year.is_some() {
            self.current_year = year;
        }
        self
    }

    /// Year tenure is measured against.
    pub fn tenure_year(&self) -> i32 {
        self.current_year.unwrap_or_else(|| chrono::Local::now().year())
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions::for_year(self.tenure_year())
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                message: e.to_string(),
            }),
    }
}

/// A count that must be at least 1.
fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match parse_var(lookup, key)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key,
            value: "0".to_string(),
            message: "must be at least 1".to_string(),
        }),
        other => Ok(other),
    }
}

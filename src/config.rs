//! Environment-driven application configuration.

use crate::eastmoney::DEFAULT_BASE_URL;
use crate::funds::refresh::RefreshZone;
use chrono_tz::Tz;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for this crate's targets; `RUST_LOG` overrides it entirely.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Grace period for services to stop after a shutdown signal.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Deadline for a single upstream fetch (directory refresh or history lookup).
    #[serde(
        default = "default_fetch_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub fetch_timeout: Duration,
    #[serde(default = "default_eastmoney_base_url")]
    pub eastmoney_base_url: String,
    /// IANA zone whose midnight drives the daily refresh; host local time if unset.
    #[serde(default, deserialize_with = "deserialize_zone")]
    pub refresh_timezone: RefreshZone,
}

impl Config {
    /// Load from the process environment (after `.env` has been applied).
    pub fn from_env() -> Result<Self, figment::Error> {
        figment::Figment::new()
            .merge(figment::providers::Env::raw())
            .extract()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_eastmoney_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Parse a duration from a bare number of seconds or a string with a unit suffix.
///
/// Accepts `30`, `"30"`, `"1.5s"`, `"250ms"`, `"5m"`, `"1h"`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn parse_duration(text: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ]);
    let parsed = parser
        .parse(text.trim())
        .map_err(|e| format!("invalid duration '{text}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
}

fn deserialize_zone<'de, D>(deserializer: D) -> Result<RefreshZone, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("local") {
        return Ok(RefreshZone::Local);
    }
    name.parse::<Tz>()
        .map(RefreshZone::Named)
        .map_err(|e| serde::de::Error::custom(format!("invalid timezone '{name}': {e}")))
}

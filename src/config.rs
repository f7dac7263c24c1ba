use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Deployment-level configuration for the evaluation core.
///
/// Per-challenge rule parameters (drawdown limits, profit target, initial
/// balance) live on the challenge row, not here.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Cold-path cadence in seconds.
    pub worker_interval_seconds: u64,
    /// Soft restart boundary for the worker process.
    pub worker_max_runtime_hours: u64,
    pub alert_warning_threshold: Decimal,
    pub alert_critical_threshold: Decimal,
    /// Persisted with every risk assessment row.
    pub assessment_version: String,
    /// Minutes without a trade before an inactivity alert fires.
    pub inactive_threshold_minutes: i64,
    /// Trade count above which a challenge is logged as high-activity.
    pub high_activity_threshold: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/propeval.db".to_string()),
            worker_interval_seconds: parse_env("WORKER_INTERVAL_SECONDS", 60)?,
            worker_max_runtime_hours: parse_env("WORKER_MAX_RUNTIME_HOURS", 24)?,
            alert_warning_threshold: parse_env_decimal("ALERT_WARNING_THRESHOLD", "60")?,
            alert_critical_threshold: parse_env_decimal("ALERT_CRITICAL_THRESHOLD", "80")?,
            assessment_version: env::var("ASSESSMENT_VERSION").unwrap_or_else(|_| "1.0".to_string()),
            inactive_threshold_minutes: parse_env("INACTIVE_THRESHOLD_MINUTES", 30)?,
            high_activity_threshold: parse_env("HIGH_ACTIVITY_THRESHOLD", 100)?,
        })
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_env_decimal(key: &str, default: &str) -> Result<Decimal> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    Decimal::from_str(&raw).with_context(|| format!("Invalid value for {}: {}", key, raw))
}

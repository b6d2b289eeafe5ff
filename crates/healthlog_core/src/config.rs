use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(String);

#[derive(Clone, Debug)]
pub struct Config {
    /// Snapshot file for the JSON-backed store.
    pub data_file: PathBuf,
    /// Trailing window re-reconciled on every wearable sync run.
    pub backfill_days: u32,
    /// CAS retries before a reconcile call surfaces a conflict.
    pub conflict_retries: u32,
    /// Backoff retries for an unavailable store.
    pub store_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function. This avoids mutating global environment in tests and keeps
    /// `from_env()` small and safe.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let data_file = get("HEALTHLOG_DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("healthlog.json"));
        let backfill_days = parse_u32(&mut get, "HEALTHLOG_BACKFILL_DAYS", 7)?;
        let conflict_retries = parse_u32(&mut get, "HEALTHLOG_CONFLICT_RETRIES", 5)?;
        let store_retries = parse_u32(&mut get, "HEALTHLOG_STORE_RETRIES", 3)?;
        Ok(Self {
            data_file,
            backfill_days,
            conflict_retries,
            store_retries,
        })
    }
}

fn parse_u32<F>(get: &mut F, key: &str, default: u32) -> Result<u32, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError(format!("{key} must be an integer, got {raw:?}"))),
    }
}

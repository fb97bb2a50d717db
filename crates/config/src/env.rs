use catsync_common::error::{CatsyncError, CatsyncResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    /// Channel the import worker claims jobs from (`root.<backend kind>`).
    pub job_channel: String,
    pub scheduler_tick_secs: u64,
    pub worker_poll_secs: u64,
    pub remote_timeout_secs: u64,
    pub remote_max_retries: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> CatsyncResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            job_channel: get_var_or("JOB_CHANNEL", "root.magento"),
            scheduler_tick_secs: parse_secs_or("SCHEDULER_TICK_SECS", 300)?,
            worker_poll_secs: parse_secs_or("WORKER_POLL_SECS", 5)?,
            remote_timeout_secs: parse_secs_or("REMOTE_TIMEOUT_SECS", 30)?,
            remote_max_retries: parse_var_or("REMOTE_MAX_RETRIES", 3)?,
        })
    }
}

fn get_var(key: &str) -> CatsyncResult<String> {
    env::var(key).map_err(|_| CatsyncError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> CatsyncResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CatsyncError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// A period in seconds; zero is rejected.
fn parse_secs_or(key: &str, default: u64) -> CatsyncResult<u64> {
    match parse_var_or(key, default)? {
        0 => Err(CatsyncError::Config(format!("{key} must be greater than 0"))),
        secs => Ok(secs),
    }
}

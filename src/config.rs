//! # Application Configuration
//!
//! Settings come from the process environment, after loading an optional
//! `.env` file. Parsing goes through a lookup function so tests can supply
//! values without touching the real environment.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::menu_spinner::DEFAULT_SPIN_COUNT;

pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const SNAPSHOT_VAR: &str = "MENU_PLANNER_SNAPSHOT";
pub const OUTPUT_DIR_VAR: &str = "MENU_PLANNER_OUTPUT_DIR";
pub const SPIN_COUNT_VAR: &str = "MENU_PLANNER_SPIN_COUNT";
pub const STORE_TIMEOUT_VAR: &str = "MENU_PLANNER_STORE_TIMEOUT_SECS";
pub const LOG_FORMAT_VAR: &str = "MENU_PLANNER_LOG_FORMAT";

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("Unknown log format '{other}' (expected 'pretty' or 'json')"),
        }
    }
}

/// Where recipes and configuration are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSource {
    Snapshot(PathBuf),
    Database(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    /// JSON snapshot path; takes precedence over the database
    pub snapshot_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub spin_count: usize,
    pub store_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            snapshot_path: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            spin_count: DEFAULT_SPIN_COUNT,
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'"))
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = AppConfig::default();

        config.database_url = get(DATABASE_URL_VAR);
        config.snapshot_path = get(SNAPSHOT_VAR).map(PathBuf::from);
        if let Some(dir) = get(OUTPUT_DIR_VAR) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(SPIN_COUNT_VAR) {
            config.spin_count = parse_number(SPIN_COUNT_VAR, &raw)?;
        }
        if let Some(raw) = get(STORE_TIMEOUT_VAR) {
            let secs: u64 = parse_number(STORE_TIMEOUT_VAR, &raw)?;
            if secs == 0 {
                bail!("{STORE_TIMEOUT_VAR} must be at least 1 second");
            }
            config.store_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get(LOG_FORMAT_VAR) {
            config.log_format = raw.parse()?;
        }

        Ok(config)
    }

    /// Pick the store backend: snapshot file first, then the database
    pub fn store_source(&self) -> Result<StoreSource> {
        if let Some(path) = &self.snapshot_path {
            return Ok(StoreSource::Snapshot(path.clone()));
        }
        match &self.database_url {
            Some(url) => Ok(StoreSource::Database(url.clone())),
            None => bail!("Neither {SNAPSHOT_VAR} nor {DATABASE_URL_VAR} is set"),
        }
    }
}

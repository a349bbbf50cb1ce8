use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const BUCKET_ENV: &str = "REPORT_UPLOAD_BUCKET";
pub const PREFIX_ENV: &str = "REPORT_NAME_PREFIX";
pub const DEFAULT_PREFIX: &str = "scans";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub omp_binary: String,
    pub command_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_failure_ceiling: u32,
    pub report_dir: PathBuf,
    pub max_checks: u32,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("VULNSCAN_CONFIG").unwrap_or_else(|_| "vulnscan.json".to_string());
        let file_cfg: Option<AppConfig> = fs::read_to_string(&path)
            .ok()
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .with_context(|| format!("failed to parse {path}"))?;

        let mut cfg = file_cfg.unwrap_or_default();

        if let Ok(v) = env::var("VULNSCAN_OMP_BINARY") {
            cfg.omp_binary = v;
        }
        if let Ok(v) = env::var("VULNSCAN_COMMAND_TIMEOUT_SECS") {
            cfg.command_timeout_secs = parse_env("VULNSCAN_COMMAND_TIMEOUT_SECS", &v)?;
        }
        if let Ok(v) = env::var("VULNSCAN_POLL_INTERVAL_SECS") {
            cfg.poll_interval_secs = parse_env("VULNSCAN_POLL_INTERVAL_SECS", &v)?;
        }
        if let Ok(v) = env::var("VULNSCAN_POLL_FAILURE_CEILING") {
            cfg.poll_failure_ceiling = parse_env("VULNSCAN_POLL_FAILURE_CEILING", &v)?;
        }
        if let Ok(v) = env::var("VULNSCAN_REPORT_DIR") {
            cfg.report_dir = PathBuf::from(v);
        }

        Ok(cfg)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            omp_binary: "/usr/bin/omp".to_string(),
            command_timeout_secs: 600,
            poll_interval_secs: 13,
            // ~1h15m of failed status queries at the default interval
            poll_failure_ceiling: 350,
            report_dir: env::temp_dir(),
            max_checks: 3,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

/// Where finished JSON reports are uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub bucket: String,
    pub prefix: String,
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(env::var(BUCKET_ENV).ok(), env::var(PREFIX_ENV).ok())
    }

    fn from_values(bucket: Option<String>, prefix: Option<String>) -> Result<Self, ConfigError> {
        let Some(bucket) = bucket.filter(|b| !b.trim().is_empty()) else {
            error!("bucket unspecified, please set {BUCKET_ENV}");
            return Err(ConfigError::MissingEnv(BUCKET_ENV));
        };
        let prefix = match prefix {
            Some(p) => p,
            None => {
                info!("report prefix unspecified, using \"{DEFAULT_PREFIX}/\"");
                DEFAULT_PREFIX.to_string()
            }
        };
        Ok(Self { bucket, prefix })
    }
}

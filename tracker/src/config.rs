//! Configuration module for the Codepulse tracker.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `CODEPULSE_API_URL` | Yes | - | Ingestion API base URL |
//! | `CODEPULSE_API_TOKEN` | No | - | Bearer token for the ingestion API |
//! | `CODEPULSE_OFFLINE_FILE` | No | `~/.codepulse/offline.json` | Offline queue file |
//! | `CODEPULSE_PLUGIN_ID` | No | 2 | Numeric plugin identifier |
//! | `CODEPULSE_SESSION_THRESHOLD_SECS` | No | 900 | Idle seconds before a session closes |
//! | `CODEPULSE_FLUSH_INTERVAL_SECS` | No | 1800 | Seconds between offline queue flushes |
//!
//! # Example
//!
//! ```no_run
//! use codepulse_tracker::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("API URL: {}", config.api_url);
//! ```

use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Default data directory name relative to home.
const DEFAULT_DATA_DIR: &str = ".codepulse";

/// Default offline queue file name within the data directory.
const DEFAULT_OFFLINE_FILE: &str = "offline.json";

/// Default plugin identifier registered with the ingestion service.
const DEFAULT_PLUGIN_ID: u32 = 2;

/// Default idle threshold before a session is closed (in seconds).
const DEFAULT_SESSION_THRESHOLD_SECS: u64 = 900;

/// Default interval between offline queue flushes (in seconds).
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 1800;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the Codepulse tracker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion API base URL.
    pub api_url: String,

    /// Bearer token for the ingestion API, when configured.
    pub api_token: Option<String>,

    /// Path of the offline queue file.
    pub offline_file: PathBuf,

    /// Numeric plugin identifier stamped into every payload.
    pub plugin_id: u32,

    /// Idle seconds after which a project's session is closed and dispatched.
    pub session_threshold_secs: u64,

    /// Seconds between attempts to flush the offline queue.
    pub flush_interval_secs: u64,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `CODEPULSE_API_URL` is not set
    /// - a numeric variable cannot be parsed or is zero
    /// - the home directory cannot be determined (needed for default paths)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Required: CODEPULSE_API_URL
        let api_url = env::var("CODEPULSE_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("CODEPULSE_API_URL".to_string()))?;

        // Optional: CODEPULSE_API_TOKEN (default: unauthenticated)
        let api_token = env::var("CODEPULSE_API_TOKEN").ok().filter(|t| !t.is_empty());

        // Optional: CODEPULSE_OFFLINE_FILE (default: ~/.codepulse/offline.json)
        let offline_file = match env::var("CODEPULSE_OFFLINE_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs
                    .home_dir()
                    .join(DEFAULT_DATA_DIR)
                    .join(DEFAULT_OFFLINE_FILE)
            }
        };

        // Optional: CODEPULSE_PLUGIN_ID (default: 2)
        let plugin_id = match env::var("CODEPULSE_PLUGIN_ID") {
            Ok(val) => val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: "CODEPULSE_PLUGIN_ID".to_string(),
                message: format!("expected non-negative integer, got '{val}'"),
            })?,
            Err(_) => DEFAULT_PLUGIN_ID,
        };

        let session_threshold_secs = positive_secs(
            "CODEPULSE_SESSION_THRESHOLD_SECS",
            DEFAULT_SESSION_THRESHOLD_SECS,
        )?;
        let flush_interval_secs =
            positive_secs("CODEPULSE_FLUSH_INTERVAL_SECS", DEFAULT_FLUSH_INTERVAL_SECS)?;

        Ok(Self {
            api_url,
            api_token,
            offline_file,
            plugin_id,
            session_threshold_secs,
            flush_interval_secs,
        })
    }
}

/// Parses an optional seconds variable that must be at least 1 when set.
fn positive_secs(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let secs = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected positive integer, got '{val}'"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be at least 1 second".to_string(),
                });
            }
            Ok(secs)
        }
        Err(_) => Ok(default),
    }
}

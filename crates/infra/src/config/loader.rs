//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `PROVANA_BILLING_ENDPOINT`: Billing service base URL
//! - `PROVANA_BILLING_TIMEOUT_MS`: Billing request timeout in milliseconds
//! - `PROVANA_BREAKER_THRESHOLD`: Consecutive failures before the circuit opens
//! - `PROVANA_BREAKER_OPEN_SECS`: Open window in seconds
//! - `PROVANA_RETRY_MAX_ATTEMPTS`: Attempts per billing call
//! - `PROVANA_RETRY_BASE_DELAY_MS`: Linear backoff base delay in milliseconds
//! - `PROVANA_RETRY_DEADLINE_MS`: Optional per-call deadline in milliseconds
//! - `PROVANA_CHANNEL_PARTITIONS`: Partitions per channel topic
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml`
//! 2. `./provana.json` or `./provana.toml`
//! 3. `../config.json` or `../config.toml`

use std::path::{Path, PathBuf};

use provana_domain::{
    BillingConfig, BreakerSettings, ChannelSettings, Config, CoreError, Result, RetrySettings,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `CoreError::Config` if configuration cannot be loaded from either
/// source, the file format is invalid, or required fields are missing.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Returns an error
/// if any are missing.
pub fn load_from_env() -> Result<Config> {
    let billing_endpoint = env_var("PROVANA_BILLING_ENDPOINT")?;
    let billing_timeout_ms = env_parse::<u64>("PROVANA_BILLING_TIMEOUT_MS")?;

    let failure_threshold = env_parse::<u32>("PROVANA_BREAKER_THRESHOLD")?;
    let open_duration_secs = env_parse::<u64>("PROVANA_BREAKER_OPEN_SECS")?;

    let max_attempts = env_parse::<u32>("PROVANA_RETRY_MAX_ATTEMPTS")?;
    let base_delay_ms = env_parse::<u64>("PROVANA_RETRY_BASE_DELAY_MS")?;
    let deadline_ms = match std::env::var("PROVANA_RETRY_DEADLINE_MS") {
        Ok(raw) => Some(raw.parse::<u64>().map_err(|e| {
            CoreError::Config(format!("Invalid PROVANA_RETRY_DEADLINE_MS: {e}"))
        })?),
        Err(_) => None,
    };

    let partitions = env_parse::<u32>("PROVANA_CHANNEL_PARTITIONS")?;

    let defaults = ChannelSettings::default();

    Ok(Config {
        billing: BillingConfig { endpoint: billing_endpoint, timeout_ms: billing_timeout_ms },
        breaker: BreakerSettings { failure_threshold, open_duration_secs },
        retry: RetrySettings { max_attempts, base_delay_ms, deadline_ms },
        channel: ChannelSettings { partitions, ..defaults },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths()
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| CoreError::Config("No config file found".to_string()))?,
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| CoreError::Config(format!("Failed to read {}: {e}", path.display())))?;

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .map_err(|e| CoreError::Config(format!("Invalid JSON config: {e}")))?,
        Some("toml") => toml::from_str(&contents)
            .map_err(|e| CoreError::Config(format!("Invalid TOML config: {e}")))?,
        other => {
            return Err(CoreError::Config(format!(
                "Unsupported config format: {other:?} ({})",
                path.display()
            )));
        }
    };

    tracing::info!(path = %path.display(), "Configuration loaded from file");
    Ok(config)
}

/// Candidate config file paths, in probe order
pub fn probe_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for dir in [".", "..", "../.."] {
        for name in ["config", "provana"] {
            for ext in ["json", "toml"] {
                paths.push(PathBuf::from(format!("{dir}/{name}.{ext}")));
            }
        }
    }
    paths
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| CoreError::Config(format!("Missing environment variable: {name}")))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    env_var(name)?
        .parse::<T>()
        .map_err(|e| CoreError::Config(format!("Invalid {name}: {e}")))
}

//! Application configuration types
//!
//! Loaded by `provana-infra::config` from environment variables or a config
//! file. All durations are plain integer fields (millis/secs) so the structs
//! stay trivially serializable in both JSON and TOML.

use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub billing: BillingConfig,
    pub breaker: BreakerSettings,
    pub retry: RetrySettings,
    pub channel: ChannelSettings,
}

/// Downstream billing RPC endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Base URL of the billing service
    pub endpoint: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self { endpoint: "http://localhost:9001".to_string(), timeout_ms: 5_000 }
    }
}

/// Circuit breaker settings for the billing dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before the half-open trial
    pub open_duration_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { failure_threshold: 5, open_duration_secs: 30 }
    }
}

/// Retry settings for a single billing call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum attempts for one logical call
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds (linear backoff)
    pub base_delay_ms: u64,
    /// Optional overall deadline in milliseconds; aborts remaining retries
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 100, deadline_ms: None }
    }
}

/// Durable event channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Partitions per topic
    pub partitions: u32,
    /// Consumer group for the provisioning consumer
    pub provisioning_group: String,
    /// Consumer group for the record-created listener
    pub notification_group: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            partitions: 4,
            provisioning_group: "billing-service".to_string(),
            notification_group: "analytics-service".to_string(),
        }
    }
}

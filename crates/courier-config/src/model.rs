// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier delivery pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-channel rate limit settings.
    #[serde(default)]
    pub rates: RatesConfig,

    /// Instance lock and circuit breaker settings.
    #[serde(default)]
    pub lock: LockConfig,

    /// Send queue dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Campaign runner settings.
    #[serde(default)]
    pub campaign: CampaignConfig,

    /// Outbound HTTP settings (flow HTTP nodes).
    #[serde(default)]
    pub http: HttpConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

/// Rate limits for both channel kinds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RatesConfig {
    /// Limits for the self-hosted bridge channel (tight: the provider bans
    /// accounts that spray).
    #[serde(default = "default_bridge_limits")]
    pub bridge: ChannelLimits,

    /// Limits for the official cloud API (permissive, provider-metered).
    #[serde(default = "default_cloud_limits")]
    pub cloud: ChannelLimits,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            bridge: default_bridge_limits(),
            cloud: default_cloud_limits(),
        }
    }
}

/// Throughput limits applied to one channel kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelLimits {
    /// Minimum delay between two sends on the same instance, in seconds.
    pub min_delay_secs: u64,
    /// Fixed-window per-minute ceiling.
    pub per_minute: u32,
    /// Fixed-window per-hour ceiling.
    pub per_hour: u32,
}

fn default_bridge_limits() -> ChannelLimits {
    ChannelLimits {
        min_delay_secs: 30,
        per_minute: 2,
        per_hour: 60,
    }
}

fn default_cloud_limits() -> ChannelLimits {
    ChannelLimits {
        min_delay_secs: 3,
        per_minute: 30,
        per_hour: 1000,
    }
}

/// Instance lock and circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Consecutive send failures before an instance is blocked.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Age in seconds after which a BUSY lock is considered abandoned and
    /// forcibly released by the sweeper.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_consecutive_errors: default_max_consecutive_errors(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_max_consecutive_errors() -> u32 {
    5
}

fn default_stale_after_secs() -> u64 {
    300
}

/// Send queue dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Seconds between dispatch passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between stale-lock sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Default attempt budget for queue items that do not specify one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential retry backoff, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Ceiling of the retry backoff, in seconds.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_cap_secs() -> u64 {
    300
}

/// Campaign runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    /// Contacts loaded per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Pause between two batches of the same campaign, in seconds.
    #[serde(default = "default_requeue_delay_secs")]
    pub requeue_delay_secs: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            requeue_delay_secs: default_requeue_delay_secs(),
        }
    }
}

fn default_batch_size() -> u32 {
    50
}

fn default_requeue_delay_secs() -> u64 {
    2
}

/// Outbound HTTP configuration for flow HTTP-request nodes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Topic every stamped metric is published under unless overridden.
pub const DEFAULT_METRICS_TOPIC: &str = "harvest.metrics";

// ── Top-level config ────────────────────────────────────────────────

/// Full configuration for the telemetry harvester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Where tenant accounts come from.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Vendor endpoint and request budget.
    #[serde(default)]
    pub vendor: VendorConfig,

    /// Polling cadence and supervision intervals.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Downstream message bus.
    #[serde(default)]
    pub writer: WriterConfig,
}

// ── Section configs ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// JSON file holding the tenant accounts.
    #[serde(default = "default_directory_path")]
    pub path: PathBuf,

    /// Restrict discovery to these tenant ids. Empty = every tenant.
    #[serde(default)]
    pub tenant_allow_list: Vec<String>,
}

fn default_directory_path() -> PathBuf {
    PathBuf::from("config/tenants.json")
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: default_directory_path(),
            tenant_allow_list: Vec::new(),
        }
    }
}

/// Vendor API endpoint plus the dual rate limit applied per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    #[serde(default = "default_vendor_endpoint")]
    pub endpoint: String,

    /// Requests allowed per `quota_window`.
    #[serde(default = "default_request_quota")]
    pub request_quota: u32,

    #[serde(default = "default_quota_window", with = "super::duration::serde_str")]
    pub quota_window: Duration,

    /// Smooth limiter ceiling.
    #[serde(default = "default_max_qps")]
    pub max_requests_per_second: u32,

    /// How long a caller waits for a quota unit before giving up.
    #[serde(default = "default_request_timeout", with = "super::duration::serde_str")]
    pub request_timeout: Duration,
}

fn default_vendor_endpoint() -> String {
    "http://127.0.0.1:8088".into()
}

fn default_request_quota() -> u32 {
    1000
}

fn default_quota_window() -> Duration {
    Duration::from_secs(60)
}

fn default_max_qps() -> u32 {
    20
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vendor_endpoint(),
            request_quota: default_request_quota(),
            quota_window: default_quota_window(),
            max_requests_per_second: default_max_qps(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Target duration of one full polling pass over a tenant.
    #[serde(default = "default_gather_window", with = "super::duration::serde_str")]
    pub gather_window: Duration,

    /// Period of tenant re-discovery and per-scheduler account checks.
    #[serde(default = "default_account_reload", with = "super::duration::serde_str")]
    pub account_reload_interval: Duration,

    /// Base unit of the catalog drift backoff (1x doubling up to 16x).
    #[serde(default = "default_catalog_reload", with = "super::duration::serde_str")]
    pub catalog_reload_interval: Duration,

    /// Period of the pending-scheduler retry sweep.
    #[serde(default = "default_retry_interval", with = "super::duration::serde_str")]
    pub retry_interval: Duration,

    /// Restrict project catalog listing to these products. Empty = all.
    #[serde(default)]
    pub product_filter_list: Vec<String>,
}

fn default_gather_window() -> Duration {
    Duration::from_secs(60)
}

fn default_account_reload() -> Duration {
    Duration::from_secs(300)
}

fn default_catalog_reload() -> Duration {
    Duration::from_secs(60)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            gather_window: default_gather_window(),
            account_reload_interval: default_account_reload(),
            catalog_reload_interval: default_catalog_reload(),
            retry_interval: default_retry_interval(),
            product_filter_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// ZeroMQ endpoint the PUB socket connects to.
    #[serde(default = "default_writer_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    /// Writes a Scheduler may have outstanding before its consume loop waits.
    #[serde(default = "default_max_inflight_writes")]
    pub max_inflight_writes: u32,
}

fn default_writer_endpoint() -> String {
    "tcp://127.0.0.1:5555".into()
}

fn default_topic() -> String {
    DEFAULT_METRICS_TOPIC.into()
}

fn default_max_inflight_writes() -> u32 {
    256
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            endpoint: default_writer_endpoint(),
            topic: default_topic(),
            max_inflight_writes: default_max_inflight_writes(),
        }
    }
}

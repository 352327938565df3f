use std::path::Path;

use tracing::{info, warn};

use crate::error::CoreError;

use super::duration::parse_duration;
use super::types::HarvestConfig;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl HarvestConfig {
    /// Parse config from a TOML string, apply env overrides, validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoreError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Apply `HARVEST_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let duration = |key: &str| {
            lookup(key).and_then(|v| match parse_duration(&v) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(key, error = %e, "ignoring invalid duration override");
                    None
                }
            })
        };
        let number = |key: &str| {
            lookup(key).and_then(|v| match v.parse::<u32>() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(key, error = %e, "ignoring invalid numeric override");
                    None
                }
            })
        };

        if let Some(v) = lookup("HARVEST_DIRECTORY_PATH") {
            self.directory.path = v.into();
        }
        if let Some(v) = lookup("HARVEST_TENANT_ALLOW_LIST") {
            self.directory.tenant_allow_list = split_list(&v);
        }

        if let Some(v) = lookup("HARVEST_VENDOR_ENDPOINT") {
            self.vendor.endpoint = v;
        }
        if let Some(n) = number("HARVEST_REQUEST_QUOTA") {
            self.vendor.request_quota = n;
        }
        if let Some(d) = duration("HARVEST_QUOTA_WINDOW") {
            self.vendor.quota_window = d;
        }
        if let Some(n) = number("HARVEST_MAX_REQUESTS_PER_SECOND") {
            self.vendor.max_requests_per_second = n;
        }
        if let Some(d) = duration("HARVEST_REQUEST_TIMEOUT") {
            self.vendor.request_timeout = d;
        }

        if let Some(d) = duration("HARVEST_GATHER_WINDOW") {
            self.schedule.gather_window = d;
        }
        if let Some(d) = duration("HARVEST_ACCOUNT_RELOAD_INTERVAL") {
            self.schedule.account_reload_interval = d;
        }
        if let Some(d) = duration("HARVEST_CATALOG_RELOAD_INTERVAL") {
            self.schedule.catalog_reload_interval = d;
        }
        if let Some(d) = duration("HARVEST_RETRY_INTERVAL") {
            self.schedule.retry_interval = d;
        }
        if let Some(v) = lookup("HARVEST_PRODUCT_FILTER_LIST") {
            self.schedule.product_filter_list = split_list(&v);
        }

        if let Some(v) = lookup("HARVEST_WRITER_ENDPOINT") {
            self.writer.endpoint = v;
        }
        if let Some(v) = lookup("HARVEST_WRITER_TOPIC") {
            self.writer.topic = v;
        }
        if let Some(n) = number("HARVEST_WRITER_MAX_INFLIGHT_WRITES") {
            self.writer.max_inflight_writes = n;
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        info!("Config loaded:");
        info!(
            "  directory: path={}, allow_list={:?}",
            self.directory.path.display(),
            self.directory.tenant_allow_list
        );
        info!(
            "  vendor:    endpoint={}, quota={}/{:?}, qps={}, timeout={:?}",
            self.vendor.endpoint,
            self.vendor.request_quota,
            self.vendor.quota_window,
            self.vendor.max_requests_per_second,
            self.vendor.request_timeout
        );
        info!(
            "  schedule:  gather={:?}, accounts={:?}, catalogs={:?}, retry={:?}, products={:?}",
            self.schedule.gather_window,
            self.schedule.account_reload_interval,
            self.schedule.catalog_reload_interval,
            self.schedule.retry_interval,
            self.schedule.product_filter_list
        );
        info!(
            "  writer:    endpoint={}, topic={}, inflight={}",
            self.writer.endpoint, self.writer.topic, self.writer.max_inflight_writes
        );
    }
}

use std::time::Duration;

use crate::error::CoreError;

use super::types::HarvestConfig;

fn non_zero(name: &str, d: Duration) -> Result<(), CoreError> {
    if d.is_zero() {
        return Err(CoreError::Config(format!("{name} must be greater than zero")));
    }
    Ok(())
}

impl HarvestConfig {
    /// Reject settings the schedulers cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.vendor.request_quota == 0 {
            return Err(CoreError::Config("vendor.request_quota must be at least 1".into()));
        }
        if self.vendor.max_requests_per_second == 0 {
            return Err(CoreError::Config(
                "vendor.max_requests_per_second must be at least 1".into(),
            ));
        }
        non_zero("vendor.quota_window", self.vendor.quota_window)?;
        non_zero("vendor.request_timeout", self.vendor.request_timeout)?;
        non_zero("schedule.gather_window", self.schedule.gather_window)?;
        non_zero("schedule.account_reload_interval", self.schedule.account_reload_interval)?;
        non_zero("schedule.catalog_reload_interval", self.schedule.catalog_reload_interval)?;
        non_zero("schedule.retry_interval", self.schedule.retry_interval)?;
        if self.writer.topic.trim().is_empty() {
            return Err(CoreError::Config("writer.topic must not be empty".into()));
        }
        if self.writer.max_inflight_writes == 0 {
            return Err(CoreError::Config("writer.max_inflight_writes must be at least 1".into()));
        }
        Ok(())
    }
}

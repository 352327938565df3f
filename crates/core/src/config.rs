//! Harvester configuration.
//!
//! Loaded from a TOML file, then overridden by `HARVEST_*` environment
//! variables, then validated. Durations are written as human strings
//! (`"90s"`, `"5m"`, `"1h30m"`, `"250ms"`).

mod duration;
mod loading;
mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use duration::{format_duration, parse_duration};
pub use loading::load_dotenv;
pub use types::{
    DirectoryConfig, HarvestConfig, ScheduleConfig, VendorConfig, WriterConfig,
    DEFAULT_METRICS_TOPIC,
};

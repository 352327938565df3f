//! Multi-tenant telemetry harvesting.
//!
//! - `grabber`: one namespace's polling and catalog-drift tasks
//! - `scheduler`: one tenant's Grabbers, output queue and hot-swap monitor
//! - `manager`: the tenant fleet and its supervisory loops
//! - `directory` / `writer`: the credential source and metric sink boundaries

pub mod directory;
pub mod error;
pub mod grabber;
pub mod manager;
pub mod scheduler;
pub mod signal;
pub mod writer;

pub use directory::{FileTenantDirectory, TenantDirectory};
pub use error::{DirectoryError, HarvestError, WriterError};
pub use grabber::{Grabber, GrabberConfig};
pub use manager::{Manager, ManagerSettings};
pub use scheduler::{
    FleetDrift, Scheduler, SchedulerSettings, TAG_META, TAG_METRIC_SCOPE, TAG_METRIC_SCOPE_ID,
    TAG_ORG_ID, TAG_ORG_NAME,
};
pub use signal::Shutdown;
pub use writer::{MetricWriter, ZmqWriter};

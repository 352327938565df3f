pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metric;
pub mod tenant;

pub use catalog::{normalize_catalog, NamespaceCatalogEntry};
pub use config::HarvestConfig;
pub use error::CoreError;
pub use lifecycle::ComponentState;
pub use metric::{Metric, WriterMessage};
pub use tenant::TenantAccount;

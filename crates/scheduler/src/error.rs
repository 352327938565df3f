use thiserror::Error;

use harvest_vendor::VendorError;

/// Errors raised while building or running the harvesting fleet.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("catalog listing failed for {scope}: {source}")]
    CatalogListing {
        scope: String,
        #[source]
        source: VendorError,
    },

    #[error("grabber for {0} has no output queue; call subscribe() first")]
    NotSubscribed(String),

    #[error("{0} is closed")]
    Closed(String),
}

impl HarvestError {
    pub(crate) fn catalog(scope: impl Into<String>, source: VendorError) -> Self {
        Self::CatalogListing {
            scope: scope.into(),
            source,
        }
    }
}

/// Errors from a tenant credential directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Errors from the downstream metric writer.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("writer unavailable: {0}")]
    Unavailable(String),
}

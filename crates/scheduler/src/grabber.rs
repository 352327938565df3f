//! Per-namespace polling unit.
//!
//! A [`Grabber`] owns one vendor namespace of one tenant. It loads the
//! namespace catalog once on construction, then runs two tasks:
//!
//! - `gather`: every `poll_interval`, fetches the latest datapoints for each
//!   catalog entry concurrently and pushes transformed batches onto the
//!   Scheduler's output queue
//! - `sync`: re-lists the catalog on a doubling backoff and reports drift to
//!   the Scheduler by slot index
//!
//! A Grabber never changes its own catalog. Drift is handled by the owner
//! replacing the whole Grabber.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use harvest_core::{Metric, NamespaceCatalogEntry};
use harvest_vendor::{transform, RateLimitedClient};

use crate::error::HarvestError;
use crate::signal::Shutdown;

/// Ceiling of the drift backoff, in reload units.
pub const MAX_BACKOFF_FACTOR: u32 = 16;

/// Construction parameters for one Grabber.
#[derive(Debug, Clone)]
pub struct GrabberConfig {
    pub namespace: String,
    pub tenant_id: String,
    /// Index of this Grabber in its Scheduler's slot array.
    pub slot: usize,
    pub poll_interval: Duration,
    /// Base unit of the catalog drift backoff.
    pub reload_unit: Duration,
}

pub struct Grabber {
    config: GrabberConfig,
    client: Arc<RateLimitedClient>,
    catalog: Vec<NamespaceCatalogEntry>,
    output: Option<mpsc::Sender<Vec<Metric>>>,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Grabber {
    /// Load the namespace catalog and build the Grabber.
    ///
    /// An empty catalog is fine; the Grabber then never emits. Listing
    /// errors are returned to the caller.
    pub async fn new(
        config: GrabberConfig,
        client: Arc<RateLimitedClient>,
    ) -> Result<Self, HarvestError> {
        let catalog = client
            .list_namespace_catalog(&config.namespace)
            .await
            .map_err(|e| HarvestError::catalog(config.namespace.as_str(), e))?;

        debug!(
            tenant_id = %config.tenant_id,
            namespace = %config.namespace,
            slot = config.slot,
            metrics = catalog.len(),
            "grabber constructed"
        );

        Ok(Self {
            config,
            client,
            catalog,
            output: None,
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn slot(&self) -> usize {
        self.config.slot
    }

    /// The catalog this Grabber polls.
    pub fn catalog(&self) -> &[NamespaceCatalogEntry] {
        &self.catalog
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Bind the shared output queue. Must happen before [`Grabber::gather`].
    pub fn subscribe(&mut self, output: mpsc::Sender<Vec<Metric>>) {
        self.output = Some(output);
    }

    /// Poll every catalog entry once per `poll_interval` until closed.
    pub async fn gather(&self) -> Result<(), HarvestError> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| HarvestError::NotSubscribed(self.config.namespace.clone()))?;

        info!(
            tenant_id = %self.config.tenant_id,
            namespace = %self.config.namespace,
            interval = ?self.config.poll_interval,
            "gather started"
        );

        loop {
            let tick = join_all(self.catalog.iter().map(|entry| self.collect(entry, output)));
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tick => {}
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        debug!(namespace = %self.config.namespace, "gather stopped");
        Ok(())
    }

    /// Fetch, transform and enqueue one catalog entry.
    async fn collect(&self, entry: &NamespaceCatalogEntry, output: &mpsc::Sender<Vec<Metric>>) {
        let batches = match self
            .client
            .fetch_latest(&entry.namespace, &entry.metric_name)
            .await
        {
            Ok(batches) => batches,
            Err(e) if e.is_empty_result() => {
                debug!(metric = %entry.metric_name, "no datapoints this window");
                return;
            }
            Err(e) => {
                warn!(
                    tenant_id = %self.config.tenant_id,
                    namespace = %entry.namespace,
                    metric = %entry.metric_name,
                    error = %e,
                    "fetch failed"
                );
                return;
            }
        };

        for raw in batches {
            let metrics = transform(&raw, entry);
            if metrics.is_empty() {
                continue;
            }
            if output.send(metrics).await.is_err() {
                debug!(namespace = %self.config.namespace, "output queue closed");
                return;
            }
        }
    }

    /// Watch the namespace catalog for drift until closed.
    ///
    /// Re-lists after 1, 2, 4, 8 and then every 16 reload units. On a
    /// difference the new catalog becomes the comparison baseline and the
    /// slot index is sent on `drift`.
    pub async fn sync(&self, drift: mpsc::Sender<usize>) {
        let mut cached = self.catalog.clone();
        let mut factor = 1;

        loop {
            let wait = self.config.reload_unit * factor;
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }
            factor = (factor * 2).min(MAX_BACKOFF_FACTOR);

            let listed = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                listed = self.client.list_namespace_catalog(&self.config.namespace) => listed,
            };

            match listed {
                Ok(catalog) if catalog != cached => {
                    info!(
                        tenant_id = %self.config.tenant_id,
                        namespace = %self.config.namespace,
                        slot = self.config.slot,
                        before = cached.len(),
                        after = catalog.len(),
                        "catalog drift detected"
                    );
                    cached = catalog;
                    // Raced so a full drift queue cannot hold up close().
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return,
                        sent = drift.send(self.config.slot) => if sent.is_err() {
                            return;
                        },
                    }
                }
                Ok(_) => debug!(namespace = %self.config.namespace, "catalog unchanged"),
                Err(e) => warn!(
                    tenant_id = %self.config.tenant_id,
                    namespace = %self.config.namespace,
                    error = %e,
                    "catalog re-listing failed"
                ),
            }
        }
    }

    /// Launch `gather` and `sync` after `start_delay`.
    pub fn spawn(self: &Arc<Self>, start_delay: Duration, drift: mpsc::Sender<usize>) {
        let gatherer = Arc::clone(self);
        let gather = tokio::spawn(async move {
            if !gatherer.wait_start(start_delay).await {
                return;
            }
            if let Err(e) = gatherer.gather().await {
                warn!(namespace = %gatherer.config.namespace, error = %e, "gather did not start");
            }
        });

        let watcher = Arc::clone(self);
        let sync = tokio::spawn(async move {
            if watcher.wait_start(start_delay).await {
                watcher.sync(drift).await;
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.push(gather);
        tasks.push(sync);
    }

    /// Sleep out the start delay. Returns `false` if closed meanwhile.
    async fn wait_start(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.shutdown.is_triggered();
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Stop both tasks and wait for them to return. Idempotent.
    pub async fn close(&self) {
        if self.shutdown.trigger() {
            debug!(namespace = %self.config.namespace, slot = self.config.slot, "closing grabber");
        }
        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}

//! Per-tenant owner of a Grabber fleet.
//!
//! A [`Scheduler`] binds one rate-limited vendor client to a tenant, builds
//! one [`Grabber`] per namespace of the tenant's project catalog and owns
//! the shared output queue those Grabbers feed. Slots in the Grabber array
//! are addressed by a stable index. At runtime only the monitor task writes
//! a slot; Grabbers reach it through the drift queue.

mod runtime;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tracing::{debug, info, warn};

use harvest_core::{ComponentState, HarvestConfig, Metric, NamespaceCatalogEntry, TenantAccount};
use harvest_vendor::{ClientConfig, RateLimitedClient, VendorApi};

use crate::error::HarvestError;
use crate::grabber::{Grabber, GrabberConfig};
use crate::signal::Shutdown;
use crate::writer::MetricWriter;

pub use runtime::{
    FleetDrift, TAG_META, TAG_METRIC_SCOPE, TAG_METRIC_SCOPE_ID, TAG_ORG_ID, TAG_ORG_NAME,
};

/// Batches buffered between the Grabbers and the consume loop.
const OUTPUT_QUEUE_CAPACITY: usize = 1024;
const DRIFT_QUEUE_CAPACITY: usize = 64;

/// Settings shared by every Scheduler in a fleet.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Poll cadence of every Grabber, and the span their starts are spread over.
    pub gather_window: Duration,
    /// Base unit of the Grabber catalog drift backoff.
    pub catalog_reload_interval: Duration,
    /// Period of the Scheduler's own tenant/namespace drift check.
    pub account_reload_interval: Duration,
    pub product_filters: Vec<String>,
    /// Writer topic for stamped metrics.
    pub topic: String,
    /// Cap on writes in flight per Scheduler.
    pub max_inflight_writes: usize,
    pub client: ClientConfig,
}

impl From<&HarvestConfig> for SchedulerSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            gather_window: config.schedule.gather_window,
            catalog_reload_interval: config.schedule.catalog_reload_interval,
            account_reload_interval: config.schedule.account_reload_interval,
            product_filters: config.schedule.product_filter_list.clone(),
            topic: config.writer.topic.clone(),
            max_inflight_writes: config.writer.max_inflight_writes as usize,
            client: ClientConfig::from(&config.vendor),
        }
    }
}

pub struct Scheduler {
    account: TenantAccount,
    /// Position in the Manager's fleet.
    slot: usize,
    settings: SchedulerSettings,
    api: Arc<dyn VendorApi>,
    writer: Arc<dyn MetricWriter>,
    /// One permit per outstanding writer call.
    write_slots: Arc<Semaphore>,
    running: AtomicBool,
    client: RwLock<Option<Arc<RateLimitedClient>>>,
    /// Namespace served by each Grabber slot.
    namespaces: RwLock<Vec<String>>,
    grabbers: Mutex<Vec<Option<Arc<Grabber>>>>,
    /// Set together with emptying `grabbers`, under the same lock.
    closed: AtomicBool,
    output_tx: mpsc::Sender<Vec<Metric>>,
    output_rx: Mutex<Option<mpsc::Receiver<Vec<Metric>>>>,
    drift_tx: mpsc::Sender<usize>,
    drift_rx: Mutex<Option<mpsc::Receiver<usize>>>,
    shutdown: Shutdown,
}

impl Scheduler {
    /// Build the Scheduler and its Grabbers.
    ///
    /// Never fails: on a catalog listing error the Scheduler comes back
    /// PENDING and is eligible for [`Scheduler::retry`].
    pub async fn new(
        account: TenantAccount,
        slot: usize,
        settings: SchedulerSettings,
        api: Arc<dyn VendorApi>,
        writer: Arc<dyn MetricWriter>,
    ) -> Self {
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
        let (drift_tx, drift_rx) = mpsc::channel(DRIFT_QUEUE_CAPACITY);

        let write_slots = Arc::new(Semaphore::new(settings.max_inflight_writes.max(1)));
        let scheduler = Self {
            account,
            slot,
            settings,
            api,
            writer,
            write_slots,
            running: AtomicBool::new(false),
            client: RwLock::new(None),
            namespaces: RwLock::new(Vec::new()),
            grabbers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            output_tx,
            output_rx: Mutex::new(Some(output_rx)),
            drift_tx,
            drift_rx: Mutex::new(Some(drift_rx)),
            shutdown: Shutdown::new(),
        };

        match scheduler.build().await {
            Ok(()) => scheduler.running.store(true, Ordering::SeqCst),
            Err(e) => warn!(
                tenant_id = %scheduler.account.tenant_id,
                error = %e,
                "scheduler construction failed, left pending"
            ),
        }
        scheduler
    }

    /// Discover namespaces and construct one subscribed Grabber per slot.
    ///
    /// State is only replaced when every Grabber was built.
    async fn build(&self) -> Result<(), HarvestError> {
        let client = Arc::new(RateLimitedClient::new(
            self.account.clone(),
            Arc::clone(&self.api),
            &self.settings.client,
        ));

        let projects = client
            .list_project_catalog(&self.settings.product_filters)
            .await
            .map_err(|e| HarvestError::catalog("project", e))?;
        let namespaces = namespaces_of(&projects);

        let mut grabbers = Vec::with_capacity(namespaces.len());
        for (slot, namespace) in namespaces.iter().enumerate() {
            let mut grabber =
                Grabber::new(self.grabber_config(namespace, slot), Arc::clone(&client)).await?;
            grabber.subscribe(self.output_tx.clone());
            grabbers.push(Some(Arc::new(grabber)));
        }

        info!(
            tenant_id = %self.account.tenant_id,
            namespaces = namespaces.len(),
            "scheduler built"
        );

        *self.client.write().await = Some(client);
        *self.namespaces.write().await = namespaces;
        *self.grabbers.lock().await = grabbers;
        Ok(())
    }

    fn grabber_config(&self, namespace: &str, slot: usize) -> GrabberConfig {
        GrabberConfig {
            namespace: namespace.to_string(),
            tenant_id: self.account.tenant_id.clone(),
            slot,
            poll_interval: self.settings.gather_window,
            reload_unit: self.settings.catalog_reload_interval,
        }
    }

    /// Repeat construction of a PENDING Scheduler.
    ///
    /// On success the state turns RUNNING; launching the tasks is the
    /// caller's job.
    pub async fn retry(&self) -> Result<(), HarvestError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HarvestError::Closed(format!("scheduler {}", self.account.tenant_id)));
        }
        if self.state().is_running() {
            return Ok(());
        }
        self.build().await?;
        self.running.store(true, Ordering::SeqCst);
        info!(tenant_id = %self.account.tenant_id, "scheduler recovered");
        Ok(())
    }

    /// Close every Grabber, then stop this Scheduler's own tasks.
    pub async fn close(&self) {
        let grabbers: Vec<Arc<Grabber>> = {
            let mut slots = self.grabbers.lock().await;
            self.closed.store(true, Ordering::SeqCst);
            slots.drain(..).flatten().collect()
        };
        for grabber in &grabbers {
            grabber.close().await;
        }
        if self.shutdown.trigger() {
            debug!(tenant_id = %self.account.tenant_id, grabbers = grabbers.len(), "scheduler closed");
        }
    }

    pub fn state(&self) -> ComponentState {
        if self.running.load(Ordering::SeqCst) {
            ComponentState::Running
        } else {
            ComponentState::Pending
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn account(&self) -> &TenantAccount {
        &self.account
    }

    pub fn tenant_id(&self) -> &str {
        &self.account.tenant_id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().await.clone()
    }

    /// Number of slots, empty ones included.
    pub async fn grabber_count(&self) -> usize {
        self.grabbers.lock().await.len()
    }

    /// Catalog of the Grabber in `slot`, `None` for an empty slot.
    pub async fn grabber_catalog(&self, slot: usize) -> Option<Vec<NamespaceCatalogEntry>> {
        let slots = self.grabbers.lock().await;
        slots
            .get(slot)
            .and_then(Option::as_ref)
            .map(|g| g.catalog().to_vec())
    }
}

/// Distinct namespaces of a project catalog, in catalog order.
fn namespaces_of(projects: &[NamespaceCatalogEntry]) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for entry in projects {
        if !namespaces.contains(&entry.namespace) {
            namespaces.push(entry.namespace.clone());
        }
    }
    namespaces
}

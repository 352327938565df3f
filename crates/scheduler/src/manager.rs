//! Top-level fleet owner.
//!
//! The [`Manager`] discovers tenants, keeps one [`Scheduler`] per tenant
//! and runs three supervisory loops once started:
//!
//! - re-discovery: rebuilds the whole fleet when the tenant set changes
//! - drift listener: rebuilds one Scheduler in place on its own request
//! - retry sweep: retries PENDING Schedulers and starts the recovered ones

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use harvest_core::{ComponentState, HarvestConfig, TenantAccount};
use harvest_vendor::VendorApi;

use crate::directory::TenantDirectory;
use crate::error::DirectoryError;
use crate::scheduler::{FleetDrift, Scheduler, SchedulerSettings};
use crate::signal::Shutdown;
use crate::writer::MetricWriter;

const DRIFT_QUEUE_CAPACITY: usize = 64;

/// Manager-level settings.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Restricts discovery to these tenant ids when non-empty.
    pub tenant_allow_list: Vec<String>,
    pub account_reload_interval: Duration,
    pub retry_interval: Duration,
    pub scheduler: SchedulerSettings,
}

impl From<&HarvestConfig> for ManagerSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            tenant_allow_list: config.directory.tenant_allow_list.clone(),
            account_reload_interval: config.schedule.account_reload_interval,
            retry_interval: config.schedule.retry_interval,
            scheduler: SchedulerSettings::from(config),
        }
    }
}

/// The Schedulers of one discovery epoch.
#[derive(Default)]
struct Fleet {
    generation: u64,
    /// Discovered accounts, sorted by tenant id. Index matches `schedulers`.
    tenants: Vec<TenantAccount>,
    schedulers: Vec<Arc<Scheduler>>,
}

pub struct Manager {
    settings: ManagerSettings,
    directory: Arc<dyn TenantDirectory>,
    api: Arc<dyn VendorApi>,
    writer: Arc<dyn MetricWriter>,
    fleet: RwLock<Fleet>,
    drift_tx: mpsc::Sender<FleetDrift>,
    drift_rx: Mutex<Option<mpsc::Receiver<FleetDrift>>>,
    shutdown: Shutdown,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl Manager {
    pub fn new(
        settings: ManagerSettings,
        directory: Arc<dyn TenantDirectory>,
        api: Arc<dyn VendorApi>,
        writer: Arc<dyn MetricWriter>,
    ) -> Self {
        let (drift_tx, drift_rx) = mpsc::channel(DRIFT_QUEUE_CAPACITY);
        Self {
            settings,
            directory,
            api,
            writer,
            fleet: RwLock::new(Fleet::default()),
            drift_tx,
            drift_rx: Mutex::new(Some(drift_rx)),
            shutdown: Shutdown::new(),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// Discover tenants and build the first fleet.
    ///
    /// A directory failure is logged and leaves the fleet empty; the
    /// re-discovery loop fills it in later.
    pub async fn init(&self) {
        let tenants = match self.discover().await {
            Ok(tenants) => tenants,
            Err(e) => {
                warn!(error = %e, "tenant discovery failed, starting with an empty fleet");
                Vec::new()
            }
        };

        let schedulers = self.build_fleet(&tenants).await;
        let running = schedulers.iter().filter(|s| s.state().is_running()).count();
        info!(tenants = tenants.len(), running, "fleet initialized");

        let mut fleet = self.fleet.write().await;
        *fleet = Fleet {
            generation: fleet.generation + 1,
            tenants,
            schedulers,
        };
    }

    /// Start every RUNNING Scheduler and the supervisory loops.
    pub async fn start(self: &Arc<Self>) {
        {
            let fleet = self.fleet.read().await;
            for scheduler in fleet.schedulers.iter().filter(|s| s.state().is_running()) {
                self.launch(scheduler, fleet.generation).await;
            }
        }

        let mut handles = vec![
            tokio::spawn(Arc::clone(self).rediscovery_loop()),
            tokio::spawn(Arc::clone(self).retry_sweep()),
        ];
        if let Some(rx) = self.drift_rx.lock().await.take() {
            handles.push(tokio::spawn(Arc::clone(self).drift_listener(rx)));
        }
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
        info!("manager started");
    }

    /// Close every Scheduler, then stop the supervisory loops.
    pub async fn close(&self) {
        {
            // Held while the signal is raised so no loop can swap in a new fleet.
            let fleet = self.fleet.write().await;
            for scheduler in &fleet.schedulers {
                scheduler.close().await;
            }
            self.shutdown.trigger();
        }

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            let _ = task.await;
        }
        info!("manager closed");
    }

    /// Current fleet generation. Starts at 1 after `init`.
    pub async fn generation(&self) -> u64 {
        self.fleet.read().await.generation
    }

    /// Tenant id and state of every Scheduler, in fleet order.
    pub async fn fleet_states(&self) -> Vec<(String, ComponentState)> {
        let fleet = self.fleet.read().await;
        fleet
            .schedulers
            .iter()
            .map(|s| (s.tenant_id().to_string(), s.state()))
            .collect()
    }

    pub async fn scheduler(&self, tenant_id: &str) -> Option<Arc<Scheduler>> {
        let fleet = self.fleet.read().await;
        fleet
            .schedulers
            .iter()
            .find(|s| s.tenant_id() == tenant_id)
            .cloned()
    }

    /// Tenants from the directory, allow-listed when configured, sorted by id.
    async fn discover(&self) -> Result<Vec<TenantAccount>, DirectoryError> {
        let mut tenants = if self.settings.tenant_allow_list.is_empty() {
            self.directory.list_tenants().await?
        } else {
            self.directory
                .list_tenants_for(&self.settings.tenant_allow_list)
                .await?
        };
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        tenants.dedup_by(|a, b| a.tenant_id == b.tenant_id);
        Ok(tenants)
    }

    async fn build_fleet(&self, tenants: &[TenantAccount]) -> Vec<Arc<Scheduler>> {
        let builds = tenants
            .iter()
            .enumerate()
            .map(|(slot, account)| self.build_scheduler(account.clone(), slot));
        join_all(builds).await
    }

    async fn build_scheduler(&self, account: TenantAccount, slot: usize) -> Arc<Scheduler> {
        Arc::new(
            Scheduler::new(
                account,
                slot,
                self.settings.scheduler.clone(),
                Arc::clone(&self.api),
                Arc::clone(&self.writer),
            )
            .await,
        )
    }

    /// Start a RUNNING Scheduler's consume, monitor and sync tasks.
    async fn launch(&self, scheduler: &Arc<Scheduler>, generation: u64) {
        scheduler.start().await;
        tokio::spawn(Arc::clone(scheduler).monitor());
        tokio::spawn(Arc::clone(scheduler).sync(
            Arc::clone(&self.directory),
            self.drift_tx.clone(),
            generation,
        ));
    }

    /// Rebuild the whole fleet whenever the discovered tenant set changes.
    async fn rediscovery_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.account_reload_interval) => {}
            }

            let tenants = match self.discover().await {
                Ok(tenants) => tenants,
                Err(e) => {
                    warn!(error = %e, "tenant re-discovery failed");
                    continue;
                }
            };
            if tenants == self.fleet.read().await.tenants {
                debug!("tenant set unchanged");
                continue;
            }
            self.rebuild_fleet(tenants).await;
        }
        debug!("re-discovery loop stopped");
    }

    async fn rebuild_fleet(&self, tenants: Vec<TenantAccount>) {
        let mut fleet = self.fleet.write().await;
        if self.shutdown.is_triggered() {
            return;
        }
        info!(
            before = fleet.tenants.len(),
            after = tenants.len(),
            "tenant set changed, rebuilding fleet"
        );

        for scheduler in &fleet.schedulers {
            scheduler.close().await;
        }
        let generation = fleet.generation + 1;
        let schedulers = self.build_fleet(&tenants).await;
        for scheduler in schedulers.iter().filter(|s| s.state().is_running()) {
            self.launch(scheduler, generation).await;
        }
        *fleet = Fleet {
            generation,
            tenants,
            schedulers,
        };
    }

    /// Rebuild single Schedulers named on the drift queue.
    async fn drift_listener(self: Arc<Self>, mut rx: mpsc::Receiver<FleetDrift>) {
        loop {
            let signal = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
            };
            self.rebuild_scheduler(signal).await;
        }
        debug!("drift listener stopped");
    }

    async fn rebuild_scheduler(&self, signal: FleetDrift) {
        let mut fleet = self.fleet.write().await;
        if self.shutdown.is_triggered() {
            return;
        }
        if signal.generation != fleet.generation {
            debug!(?signal, current = fleet.generation, "ignoring drift from a previous fleet");
            return;
        }
        let Some(old) = fleet.schedulers.get(signal.slot).cloned() else {
            return;
        };

        let tenant_ids = [old.tenant_id().to_string()];
        let account = match self.directory.list_tenants_for(&tenant_ids).await {
            Ok(accounts) => accounts.into_iter().find(|a| a.tenant_id == tenant_ids[0]),
            Err(e) => {
                warn!(tenant_id = %tenant_ids[0], error = %e, "tenant lookup failed, keeping scheduler");
                return;
            }
        };
        let Some(account) = account else {
            debug!(tenant_id = %tenant_ids[0], "tenant gone, left to re-discovery");
            return;
        };

        info!(tenant_id = %account.tenant_id, slot = signal.slot, "rebuilding scheduler");
        old.close().await;
        let fresh = self.build_scheduler(account.clone(), signal.slot).await;
        if fresh.state().is_running() {
            self.launch(&fresh, fleet.generation).await;
        }
        fleet.schedulers[signal.slot] = fresh;
        fleet.tenants[signal.slot] = account;
    }

    /// Retry PENDING Schedulers every `retry_interval`.
    ///
    /// A tick where every Scheduler is RUNNING does nothing.
    async fn retry_sweep(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.retry_interval) => {}
            }

            let (generation, pending) = {
                let fleet = self.fleet.read().await;
                let pending: Vec<_> = fleet
                    .schedulers
                    .iter()
                    .filter(|s| !s.state().is_running())
                    .cloned()
                    .collect();
                (fleet.generation, pending)
            };
            if pending.is_empty() {
                continue;
            }

            debug!(pending = pending.len(), "retrying pending schedulers");
            for scheduler in pending {
                match scheduler.retry().await {
                    Ok(()) => self.launch_if_current(&scheduler, generation).await,
                    Err(e) => warn!(
                        tenant_id = %scheduler.tenant_id(),
                        error = %e,
                        "scheduler retry failed"
                    ),
                }
            }
        }
        debug!("retry sweep stopped");
    }

    /// Launch a recovered Scheduler unless its fleet was replaced meanwhile.
    async fn launch_if_current(&self, scheduler: &Arc<Scheduler>, generation: u64) {
        let fleet = self.fleet.read().await;
        if fleet.generation != generation || self.shutdown.is_triggered() || scheduler.is_closed() {
            return;
        }
        self.launch(scheduler, generation).await;
    }
}

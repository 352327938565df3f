use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tracing::{debug, info, warn};

use harvest_core::{Metric, WriterMessage};

use super::{namespaces_of, Scheduler};
use crate::directory::TenantDirectory;
use crate::grabber::Grabber;

pub const TAG_ORG_ID: &str = "org_id";
pub const TAG_ORG_NAME: &str = "org_name";
pub const TAG_META: &str = "_meta";
pub const TAG_METRIC_SCOPE: &str = "_metric_scope";
pub const TAG_METRIC_SCOPE_ID: &str = "_metric_scope_id";

/// A Scheduler asking its Manager to rebuild it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetDrift {
    /// Fleet generation the signalling Scheduler belongs to.
    pub generation: u64,
    /// The Scheduler's position in that fleet.
    pub slot: usize,
}

impl Scheduler {
    /// Launch every Grabber with staggered starts plus the consume loop.
    ///
    /// Grabber `i` of `n` starts after `i * gather_window / n`, so a full
    /// polling pass is spread across the window. No-op on a PENDING or
    /// closed Scheduler; the consume loop is only ever launched once.
    pub async fn start(self: &Arc<Self>) {
        if !self.state().is_running() || self.is_closed() {
            return;
        }

        {
            let slots = self.grabbers.lock().await;
            let step = stagger_step(self.settings.gather_window, slots.len());
            for (i, grabber) in slots.iter().enumerate() {
                if let Some(grabber) = grabber {
                    grabber.spawn(step * i as u32, self.drift_tx.clone());
                }
            }
            info!(
                tenant_id = %self.account.tenant_id,
                grabbers = slots.len(),
                stagger = ?step,
                "scheduler started"
            );
        }

        if let Some(rx) = self.output_rx.lock().await.take() {
            tokio::spawn(Arc::clone(self).consume(rx));
        }
    }

    /// Drain the output queue, stamping and handing each metric to the writer.
    ///
    /// Each write holds a permit from `write_slots`; once they are all taken
    /// the loop waits, and backpressure reaches the Grabbers through the
    /// bounded output queue.
    async fn consume(self: Arc<Self>, mut rx: mpsc::Receiver<Vec<Metric>>) {
        'consume: loop {
            let batch = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                batch = rx.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };
            for metric in batch {
                let permit = tokio::select! {
                    _ = self.shutdown.cancelled() => break 'consume,
                    permit = Arc::clone(&self.write_slots).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'consume,
                    },
                };
                self.dispatch(self.stamp(metric), permit);
            }
        }
        debug!(tenant_id = %self.account.tenant_id, "consume loop stopped");
    }

    /// Attach tenant identity and provenance tags.
    pub fn stamp(&self, metric: Metric) -> Metric {
        metric
            .with_tag(TAG_ORG_ID, self.account.tenant_id.as_str())
            .with_tag(TAG_ORG_NAME, self.account.display_name.as_str())
            .with_tag(TAG_META, "true")
            .with_tag(TAG_METRIC_SCOPE, "org")
            .with_tag(TAG_METRIC_SCOPE_ID, self.account.tenant_id.as_str())
    }

    /// Serialize and write one metric without blocking the consume loop.
    ///
    /// The permit is released when the write finishes.
    fn dispatch(&self, metric: Metric, permit: OwnedSemaphorePermit) {
        let message = match WriterMessage::from_metric(self.settings.topic.as_str(), &metric) {
            Ok(message) => message,
            Err(e) => {
                warn!(metric = %metric.name, error = %e, "metric serialization failed");
                return;
            }
        };

        let writer = Arc::clone(&self.writer);
        let tenant_id = self.account.tenant_id.clone();
        tokio::spawn(async move {
            if let Err(e) = writer.write(&message.topic, message.payload).await {
                warn!(tenant_id = %tenant_id, error = %e, "metric write failed");
            }
            drop(permit);
        });
    }

    /// Hot-swap Grabbers named on the drift queue until closed.
    pub async fn monitor(self: Arc<Self>) {
        let Some(mut rx) = self.drift_rx.lock().await.take() else {
            warn!(tenant_id = %self.account.tenant_id, "monitor already running");
            return;
        };

        loop {
            let slot = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                slot = rx.recv() => match slot {
                    Some(slot) => slot,
                    None => break,
                },
            };
            self.swap(slot).await;
        }
        debug!(tenant_id = %self.account.tenant_id, "monitor stopped");
    }

    /// Replace the Grabber in `slot` with one built from a fresh catalog.
    ///
    /// On a construction failure the slot stays empty until the next
    /// drift signal or [`Scheduler::request_swap`].
    async fn swap(&self, slot: usize) {
        let Some(namespace) = self.namespaces.read().await.get(slot).cloned() else {
            warn!(tenant_id = %self.account.tenant_id, slot, "drift signal for unknown slot");
            return;
        };
        let Some(client) = self.client.read().await.clone() else {
            return;
        };

        let old = {
            let mut slots = self.grabbers.lock().await;
            slots.get_mut(slot).and_then(Option::take)
        };
        if let Some(old) = old {
            old.close().await;
        }

        let mut grabber = match Grabber::new(self.grabber_config(&namespace, slot), client).await {
            Ok(grabber) => grabber,
            Err(e) => {
                warn!(
                    tenant_id = %self.account.tenant_id,
                    namespace = %namespace,
                    slot,
                    error = %e,
                    "grabber rebuild failed, slot left empty"
                );
                return;
            }
        };
        grabber.subscribe(self.output_tx.clone());
        let grabber = Arc::new(grabber);

        let mut slots = self.grabbers.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            drop(slots);
            grabber.close().await;
            return;
        }
        grabber.spawn(Duration::ZERO, self.drift_tx.clone());
        if let Some(entry) = slots.get_mut(slot) {
            *entry = Some(grabber);
        }
        info!(
            tenant_id = %self.account.tenant_id,
            namespace = %namespace,
            slot,
            "grabber hot-swapped"
        );
    }

    /// Queue a rebuild of `slot`, e.g. one left empty by a failed swap.
    ///
    /// Returns `false` if the drift queue is full or the monitor is gone.
    pub fn request_swap(&self, slot: usize) -> bool {
        self.drift_tx.try_send(slot).is_ok()
    }

    /// Check the tenant entry and namespace set every `account_reload_interval`.
    ///
    /// On a change this Scheduler's fleet slot goes to the Manager, which
    /// rebuilds it in place. A tenant missing from the directory is left to
    /// the Manager's re-discovery.
    pub async fn sync(
        self: Arc<Self>,
        directory: Arc<dyn TenantDirectory>,
        drift: mpsc::Sender<FleetDrift>,
        generation: u64,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.account_reload_interval) => {}
            }

            let drifted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                drifted = self.has_drifted(directory.as_ref()) => drifted,
            };
            if !drifted {
                continue;
            }

            info!(tenant_id = %self.account.tenant_id, slot = self.slot, "tenant drift detected");
            let signal = FleetDrift {
                generation,
                slot: self.slot,
            };
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                sent = drift.send(signal) => if sent.is_err() {
                    break;
                },
            }
        }
    }

    async fn has_drifted(&self, directory: &dyn TenantDirectory) -> bool {
        let tenant_ids = [self.account.tenant_id.clone()];
        match directory.list_tenants_for(&tenant_ids).await {
            Ok(accounts) => match accounts.into_iter().find(|a| a.tenant_id == self.account.tenant_id) {
                Some(current) if current != self.account => return true,
                Some(_) => {}
                None => debug!(tenant_id = %self.account.tenant_id, "tenant not listed"),
            },
            Err(e) => warn!(tenant_id = %self.account.tenant_id, error = %e, "tenant lookup failed"),
        }

        let Some(client) = self.client.read().await.clone() else {
            return false;
        };
        match client.list_project_catalog(&self.settings.product_filters).await {
            Ok(projects) => namespaces_of(&projects) != *self.namespaces.read().await,
            Err(e) => {
                warn!(tenant_id = %self.account.tenant_id, error = %e, "project re-listing failed");
                false
            }
        }
    }
}

/// Start offset between consecutive Grabbers.
fn stagger_step(window: Duration, grabbers: usize) -> Duration {
    match u32::try_from(grabbers) {
        Ok(0) | Err(_) => Duration::ZERO,
        Ok(n) => window / n,
    }
}

//! Shared fakes for the scheduler integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use harvest_core::{Metric, NamespaceCatalogEntry, TenantAccount};
use harvest_scheduler::{
    DirectoryError, MetricWriter, SchedulerSettings, TenantDirectory, WriterError,
};
use harvest_vendor::{ClientConfig, VendorApi, VendorError, VendorRequest, VendorResponse};

pub const BATCH: &str = r#"[{"timestamp":1593762660,"Average":1.6,"instanceId":"i-1"}]"#;

pub fn account(id: &str) -> TenantAccount {
    TenantAccount::new(id, format!("tenant-{id}"), format!("ak-{id}"), "secret")
}

pub fn entry(namespace: &str, metric: &str) -> NamespaceCatalogEntry {
    NamespaceCatalogEntry::new(namespace, metric, "Average")
}

pub fn settings(gather_window: Duration) -> SchedulerSettings {
    SchedulerSettings {
        gather_window,
        catalog_reload_interval: Duration::from_millis(50),
        account_reload_interval: Duration::from_secs(3600),
        product_filters: Vec::new(),
        topic: "harvest.test".into(),
        max_inflight_writes: 64,
        client: ClientConfig {
            request_quota: 10_000,
            quota_window: Duration::from_secs(60),
            max_qps: 1000,
            request_timeout: Duration::from_secs(1),
        },
    }
}

/// In-memory vendor with per-namespace catalogs and one batch per metric.
#[derive(Default)]
pub struct FakeVendor {
    catalogs: Mutex<HashMap<String, Vec<NamespaceCatalogEntry>>>,
    /// Tenants whose project listing fails.
    failing_tenants: Mutex<Vec<String>>,
    fail_namespace_listing: AtomicBool,
    /// (namespace, time) of every datapoint fetch.
    fetches: Mutex<Vec<(String, Instant)>>,
    project_listings: AtomicUsize,
}

impl FakeVendor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_catalog(&self, namespace: &str, entries: Vec<NamespaceCatalogEntry>) {
        self.catalogs
            .lock()
            .unwrap()
            .insert(namespace.to_string(), entries);
    }

    pub fn fail_projects_for(&self, tenant_id: &str, fail: bool) {
        let mut failing = self.failing_tenants.lock().unwrap();
        failing.retain(|t| t != tenant_id);
        if fail {
            failing.push(tenant_id.to_string());
        }
    }

    pub fn fail_namespace_listing(&self, fail: bool) {
        self.fail_namespace_listing.store(fail, Ordering::SeqCst);
    }

    pub fn first_fetch(&self, namespace: &str) -> Option<Instant> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, at)| *at)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn project_listings(&self) -> usize {
        self.project_listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VendorApi for FakeVendor {
    async fn call(
        &self,
        account: &TenantAccount,
        request: &VendorRequest,
    ) -> Result<VendorResponse, VendorError> {
        match request {
            VendorRequest::ListProjectCatalog { .. } => {
                self.project_listings.fetch_add(1, Ordering::SeqCst);
                if self.failing_tenants.lock().unwrap().contains(&account.tenant_id) {
                    return Err(VendorError::RequestFailed("project listing down".into()));
                }
                let mut namespaces: Vec<_> = self.catalogs.lock().unwrap().keys().cloned().collect();
                namespaces.sort();
                Ok(VendorResponse::Catalog(
                    namespaces
                        .into_iter()
                        .map(|ns| NamespaceCatalogEntry::new(ns, "", ""))
                        .collect(),
                ))
            }
            VendorRequest::ListNamespaceCatalog { namespace } => {
                if self.fail_namespace_listing.load(Ordering::SeqCst) {
                    return Err(VendorError::RequestFailed("namespace listing down".into()));
                }
                match self.catalogs.lock().unwrap().get(namespace) {
                    Some(entries) if !entries.is_empty() => {
                        Ok(VendorResponse::Catalog(entries.clone()))
                    }
                    _ => Err(VendorError::EmptyResult),
                }
            }
            VendorRequest::FetchLatest { namespace, .. } => {
                self.fetches
                    .lock()
                    .unwrap()
                    .push((namespace.clone(), Instant::now()));
                Ok(VendorResponse::Datapoints(vec![BATCH.to_string()]))
            }
        }
    }
}

/// Directory over a mutable in-memory account list.
#[derive(Default)]
pub struct FakeDirectory {
    tenants: Mutex<Vec<TenantAccount>>,
    failing: AtomicBool,
}

impl FakeDirectory {
    pub fn with(tenants: Vec<TenantAccount>) -> Arc<Self> {
        Arc::new(Self {
            tenants: Mutex::new(tenants),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set(&self, tenants: Vec<TenantAccount>) {
        *self.tenants.lock().unwrap() = tenants;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantDirectory for FakeDirectory {
    async fn list_tenants(&self) -> Result<Vec<TenantAccount>, DirectoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DirectoryError::Backend("directory down".into()));
        }
        Ok(self.tenants.lock().unwrap().clone())
    }
}

/// Writer that keeps every decoded metric.
#[derive(Default)]
pub struct RecordingWriter {
    records: Mutex<Vec<(String, Metric)>>,
    failing: AtomicBool,
}

impl RecordingWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let writer = Self::default();
        writer.failing.store(true, Ordering::SeqCst);
        Arc::new(writer)
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }
}

#[async_trait]
impl MetricWriter for RecordingWriter {
    async fn write(&self, topic: &str, payload: Vec<u8>) -> Result<(), WriterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WriterError::Unavailable("sink down".into()));
        }
        let metric: Metric = serde_json::from_slice(&payload)
            .map_err(|e| WriterError::Unavailable(e.to_string()))?;
        self.records.lock().unwrap().push((topic.to_string(), metric));
        Ok(())
    }
}

/// Poll `check` every 20ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

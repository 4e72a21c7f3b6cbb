//! The reconciler/resolver at the center of the engine.
//!
//! [`ClusterDns`] owns the record cache under a single reader-writer lock.
//! Catalog callbacks (the write side) turn service and endpoint changes into
//! whole-subtree swaps; queries (the read side) walk the tree concurrently.
//! Every mutation replaces a service's subtree in one step, so out-of-order
//! delivery between the service and endpoint streams converges to the same
//! final state.

use parking_lot::RwLock;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::TreeCache;
use crate::catalog::{object_key, Endpoints, KeyedObject, ObjectStore, Service};
use crate::error::DnsError;
use crate::metrics::{self, QueryResult, Timer};
use crate::records::{self, DnsRecord, POD_SUBDOMAIN, SERVICE_SUBDOMAIN};

/// Name of the well-known control-plane service used as the readiness barrier.
pub const CONTROL_PLANE_SERVICE: &str = "kubernetes";

/// Namespace of the well-known control-plane service.
pub const CONTROL_PLANE_NAMESPACE: &str = "default";

const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The cluster DNS engine: reconciles catalog changes into the record cache
/// and serves forward lookups from it.
///
/// Cloning is cheap; all clones share the same cache and stores.
#[derive(Clone)]
pub struct ClusterDns {
    /// The domain this engine is authoritative for, as configured.
    domain: String,
    /// The domain as a reversed label path, e.g. `["local", "cluster"]`.
    domain_path: Arc<Vec<String>>,
    /// Record cache; mutations take the write side, queries the read side.
    cache: Arc<RwLock<TreeCache>>,
    /// Catalog view of all services, kept current by the watch layer.
    services: Arc<dyn ObjectStore<Service>>,
    /// Catalog view of all endpoints, kept current by the watch layer.
    endpoints: Arc<dyn ObjectStore<Endpoints>>,
}

impl ClusterDns {
    /// Create an engine authoritative for `domain` (e.g. "cluster.local."),
    /// reading related objects from the given catalog stores.
    pub fn new(
        domain: &str,
        services: Arc<dyn ObjectStore<Service>>,
        endpoints: Arc<dyn ObjectStore<Endpoints>>,
    ) -> Self {
        let domain_path: Vec<String> = domain
            .trim_end_matches('.')
            .split('.')
            .rev()
            .map(str::to_string)
            .collect();

        Self {
            domain: domain.to_string(),
            domain_path: Arc::new(domain_path),
            cache: Arc::new(RwLock::new(TreeCache::new())),
            services,
            endpoints,
        }
    }

    /// The domain this engine is authoritative for.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// A service appeared in the catalog. Portal services install their
    /// records immediately; headless services install whatever their current
    /// endpoints allow, which may be nothing yet.
    pub fn on_service_add(&self, service: &Service) {
        if !service.has_cluster_ip() {
            self.on_headless_service_add(service);
            return;
        }
        if service.ports.is_empty() {
            warn!(service = %service.key(), "portal service has no ports");
        }
        debug!(service = %service.key(), cluster_ip = %service.cluster_ip, "installing portal service");
        let sub = records::portal_subtree(service, &self.domain);
        self.install_subtree(service, sub, "portal");
    }

    /// A service changed. Handled as a full re-add: the fresh subtree swap
    /// covers portal/headless transitions and port renames alike.
    pub fn on_service_update(&self, _old: &Service, new: &Service) {
        self.on_service_add(new);
    }

    /// A service disappeared from the catalog; drop its whole subtree.
    pub fn on_service_delete(&self, service: &Service) {
        debug!(service = %service.key(), "removing service records");
        let mut path = self.namespace_path(&service.namespace);
        path.push(service.name.clone());
        let path: Vec<&str> = path.iter().map(String::as_str).collect();

        self.cache.write().delete_path(&path);
    }

    /// An endpoints object appeared or changed. Only headless services
    /// materialize endpoints as records; portal and unknown services ignore
    /// the event.
    pub fn on_endpoints_change(&self, endpoints: &Endpoints) {
        let Some(service) = self.services.get_by_key(&endpoints.key()) else {
            debug!(endpoints = %endpoints.key(), "no service for endpoints yet");
            return;
        };
        if service.has_cluster_ip() {
            return;
        }
        self.install_headless(&service, endpoints);
    }

    fn on_headless_service_add(&self, service: &Service) {
        match self.endpoints.get_by_key(&service.key()) {
            Some(endpoints) => self.install_headless(service, &endpoints),
            None => {
                debug!(
                    service = %service.key(),
                    "no endpoints for headless service; records appear when endpoints arrive"
                );
            }
        }
    }

    fn install_headless(&self, service: &Service, endpoints: &Endpoints) {
        match records::headless_subtree(service, endpoints, &self.domain) {
            Ok(sub) => self.install_subtree(service, sub, "headless"),
            // The failing service's previous subtree stays in place.
            Err(e) => {
                error!(service = %service.key(), error = %e, "headless record synthesis failed");
                metrics::record_synthesis_failure();
            }
        }
    }

    /// Swap `sub` in as the service's whole subtree under the write lock.
    fn install_subtree(&self, service: &Service, sub: TreeCache, kind: &str) {
        let path = self.namespace_path(&service.namespace);
        let path: Vec<&str> = path.iter().map(String::as_str).collect();

        let mut cache = self.cache.write();
        cache.set_sub_cache(&service.name, sub, &path);
        metrics::record_subtree_swap(kind);
    }

    /// Reversed path of a namespace's service subtree: `D ++ ["svc", ns]`.
    fn namespace_path(&self, namespace: &str) -> Vec<String> {
        let mut path = (*self.domain_path).clone();
        path.push(SERVICE_SUBDOMAIN.to_string());
        path.push(namespace.to_string());
        path
    }

    /// Resolve `name` to its record set.
    ///
    /// With `exact` set, the final label must select an entry at the exact
    /// path. Otherwise the lookup honors `"*"` wildcard labels and collects
    /// everything the path matches. Pod names
    /// (`<dash-encoded-ip>.<ns>.pod.<domain>`) are synthesized on the fly and
    /// never hit the cache.
    pub fn records(&self, name: &str, exact: bool) -> Result<Vec<Arc<DnsRecord>>, DnsError> {
        let timer = Timer::start();
        debug!(name, exact, "resolving query");

        let trimmed = name.trim_end_matches('.');
        let path: Vec<&str> = trimmed.split('.').rev().collect();

        if self.is_pod_query(&path) {
            return match pod_ip(&path) {
                Ok(ip) => {
                    metrics::record_query("pod", QueryResult::Success, timer.elapsed());
                    Ok(vec![records::new_record(ip, 0)])
                }
                Err(e) => {
                    metrics::record_query("pod", QueryResult::InvalidIp, timer.elapsed());
                    Err(e)
                }
            };
        }

        if exact {
            let Some((key, prefix)) = path.split_last() else {
                return Ok(Vec::new());
            };
            if key.is_empty() {
                return Ok(Vec::new());
            }
            return match self.cache.read().get_entry(key, prefix) {
                Some(record) => {
                    metrics::record_query("exact", QueryResult::Success, timer.elapsed());
                    Ok(vec![record])
                }
                None => {
                    metrics::record_query("exact", QueryResult::NotFound, timer.elapsed());
                    Err(DnsError::NotFound {
                        name: name.to_string(),
                    })
                }
            };
        }

        let found = self.cache.read().values_for_path_with_wildcards(&path);
        if found.is_empty() {
            metrics::record_query("wildcard", QueryResult::NotFound, timer.elapsed());
            return Err(DnsError::NotFound {
                name: name.to_string(),
            });
        }
        debug!(name, count = found.len(), "query matched");
        metrics::record_query("wildcard", QueryResult::Success, timer.elapsed());
        metrics::record_records_returned(found.len());
        Ok(found)
    }

    /// Reverse (PTR) lookup. Not served by this zone: wildcard names are
    /// rejected outright and everything else reports the missing capability.
    pub fn reverse_record(&self, name: &str) -> Result<Arc<DnsRecord>, DnsError> {
        debug!(name, "reverse query");
        if name.trim_end_matches('.').split('.').any(|label| label == "*") {
            return Err(DnsError::NotSupported(
                "reverse lookup cannot contain wildcards",
            ));
        }
        Err(DnsError::NotSupported("reverse lookup is not served"))
    }

    /// Render the record cache as pretty-printed JSON for introspection.
    pub fn cache_as_json(&self) -> Result<String, DnsError> {
        Ok(self.cache.read().serialize()?)
    }

    /// Whether the catalog connection has proven itself by delivering the
    /// well-known control-plane service.
    pub fn is_ready(&self) -> bool {
        self.services
            .get_by_key(&object_key(CONTROL_PLANE_NAMESPACE, CONTROL_PLANE_SERVICE))
            .is_some()
    }

    /// Block until [`ClusterDns::is_ready`] holds, polling the services store.
    pub async fn wait_until_ready(&self) {
        let key = object_key(CONTROL_PLANE_NAMESPACE, CONTROL_PLANE_SERVICE);
        info!(service = %key, "waiting for control-plane service");
        loop {
            if self.is_ready() {
                info!(service = %key, "control-plane service observed");
                return;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Emit current state gauges.
    pub fn emit_metrics(&self) {
        metrics::record_cache_entries(self.cache.read().entry_count());
        metrics::record_ready_state(self.is_ready());
    }

    /// A pod name has exactly three labels past the domain, `pod` as the
    /// first of them, and no wildcards anywhere.
    fn is_pod_query(&self, path: &[&str]) -> bool {
        path.len() == self.domain_path.len() + 3
            && path[self.domain_path.len()] == POD_SUBDOMAIN
            && !path.iter().any(|label| *label == "*")
    }
}

/// Decode the dash-encoded IPv4 of a pod name (`1-2-3-4` -> `1.2.3.4`).
fn pod_ip(path: &[&str]) -> Result<String, DnsError> {
    let dashed = path[path.len() - 1];
    let ip = dashed.replace('-', ".");
    match ip.parse::<Ipv4Addr>() {
        Ok(_) => Ok(ip),
        Err(_) => Err(DnsError::InvalidIp(ip)),
    }
}

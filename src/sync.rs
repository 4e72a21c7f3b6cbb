//! Bridges control-plane watch streams into reconciler callbacks.
//!
//! The host's list/watch client delivers typed [`WatchEvent`]s on one stream
//! per resource. The pump mirrors each object into its [`MemoryStore`] (so
//! callbacks can look up related objects) and then invokes the matching
//! [`ClusterDns`] callback. Ordering is preserved per stream, not across
//! streams; the reconciler's whole-subtree swaps absorb the difference.

use futures::{Stream, StreamExt};
use tracing::{error, info};

use crate::catalog::{CatalogObject, Endpoints, KeyedObject, MemoryStore, Service, WatchEvent};
use crate::error::DnsError;
use crate::metrics::{self, SyncEventType};
use crate::resolver::ClusterDns;
use std::sync::Arc;

/// Drives a [`ClusterDns`] engine from catalog watch streams.
pub struct CatalogSync {
    dns: ClusterDns,
    services: Arc<MemoryStore<Service>>,
    endpoints: Arc<MemoryStore<Endpoints>>,
}

impl CatalogSync {
    /// Create a pump feeding `dns` and the two stores the engine reads from.
    pub fn new(
        dns: ClusterDns,
        services: Arc<MemoryStore<Service>>,
        endpoints: Arc<MemoryStore<Endpoints>>,
    ) -> Self {
        Self {
            dns,
            services,
            endpoints,
        }
    }

    /// Consume both watch streams until they end. Shutdown is the host's
    /// concern: it closes the streams.
    pub async fn run<S, E>(self, mut service_events: S, mut endpoint_events: E)
    where
        S: Stream<Item = WatchEvent> + Unpin,
        E: Stream<Item = WatchEvent> + Unpin,
    {
        let mut services_done = false;
        let mut endpoints_done = false;

        while !(services_done && endpoints_done) {
            tokio::select! {
                event = service_events.next(), if !services_done => match event {
                    Some(event) => self.handle_service_event(event),
                    None => {
                        info!("services watch stream ended");
                        services_done = true;
                    }
                },
                event = endpoint_events.next(), if !endpoints_done => match event {
                    Some(event) => self.handle_endpoint_event(event),
                    None => {
                        info!("endpoints watch stream ended");
                        endpoints_done = true;
                    }
                },
            }
        }
    }

    fn handle_service_event(&self, event: WatchEvent) {
        match event {
            WatchEvent::Added(object) => {
                if let Some(service) = self.assert_service(object) {
                    metrics::record_sync_event("services", SyncEventType::Add);
                    self.services.insert(service.clone());
                    self.dns.on_service_add(&service);
                }
            }
            WatchEvent::Updated { old, new } => {
                if let (Some(old), Some(new)) =
                    (self.assert_service(old), self.assert_service(new))
                {
                    metrics::record_sync_event("services", SyncEventType::Update);
                    self.services.insert(new.clone());
                    self.dns.on_service_update(&old, &new);
                }
            }
            WatchEvent::Deleted(object) => {
                if let Some(service) = self.assert_service(object) {
                    metrics::record_sync_event("services", SyncEventType::Delete);
                    self.services.remove(&service.key());
                    self.dns.on_service_delete(&service);
                }
            }
        }
    }

    fn handle_endpoint_event(&self, event: WatchEvent) {
        match event {
            WatchEvent::Added(object) | WatchEvent::Updated { new: object, .. } => {
                if let Some(endpoints) = self.assert_endpoints(object) {
                    metrics::record_sync_event("endpoints", SyncEventType::Update);
                    self.endpoints.insert(endpoints.clone());
                    self.dns.on_endpoints_change(&endpoints);
                }
            }
            // Endpoint deletions carry no record work of their own: the
            // subtree goes away with the service delete.
            WatchEvent::Deleted(object) => {
                if let Some(endpoints) = self.assert_endpoints(object) {
                    metrics::record_sync_event("endpoints", SyncEventType::Delete);
                    self.endpoints.remove(&endpoints.key());
                }
            }
        }
    }

    fn assert_service(&self, object: CatalogObject) -> Option<Service> {
        match assert_service(object) {
            Ok(service) => Some(service),
            Err(e) => {
                error!(error = %e, "dropping object from services stream");
                metrics::record_type_assertion_failure("services");
                None
            }
        }
    }

    fn assert_endpoints(&self, object: CatalogObject) -> Option<Endpoints> {
        match assert_endpoints(object) {
            Ok(endpoints) => Some(endpoints),
            Err(e) => {
                error!(error = %e, "dropping object from endpoints stream");
                metrics::record_type_assertion_failure("endpoints");
                None
            }
        }
    }
}

fn assert_service(object: CatalogObject) -> Result<Service, DnsError> {
    match object {
        CatalogObject::Service(service) => Ok(service),
        other => Err(DnsError::TypeAssertion {
            expected: "service",
            got: other.kind(),
        }),
    }
}

fn assert_endpoints(object: CatalogObject) -> Result<Endpoints, DnsError> {
    match object {
        CatalogObject::Endpoints(endpoints) => Ok(endpoints),
        other => Err(DnsError::TypeAssertion {
            expected: "endpoints",
            got: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> CatalogObject {
        CatalogObject::Service(Service {
            namespace: "default".to_string(),
            name: name.to_string(),
            cluster_ip: "10.0.0.1".to_string(),
            ports: vec![],
        })
    }

    fn endpoints(name: &str) -> CatalogObject {
        CatalogObject::Endpoints(Endpoints {
            namespace: "default".to_string(),
            name: name.to_string(),
            annotations: Default::default(),
            subsets: vec![],
        })
    }

    #[test]
    fn test_assert_service_accepts_service() {
        assert_eq!(assert_service(service("web")).unwrap().name, "web");
    }

    #[test]
    fn test_assert_service_rejects_endpoints() {
        assert!(matches!(
            assert_service(endpoints("web")),
            Err(DnsError::TypeAssertion {
                expected: "service",
                got: "endpoints",
            })
        ));
    }

    #[test]
    fn test_assert_endpoints_rejects_service() {
        assert!(matches!(
            assert_endpoints(service("web")),
            Err(DnsError::TypeAssertion {
                expected: "endpoints",
                got: "service",
            })
        ));
    }
}

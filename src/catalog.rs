//! Control-plane object model consumed by the DNS engine.
//!
//! The engine never talks to the control plane directly. Its only seam is the
//! [`ObjectStore`] lookup trait plus the typed [`WatchEvent`] stream consumed
//! by [`crate::sync::CatalogSync`]. The list/watch client that populates both
//! lives outside this crate.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marker value for a service that has deliberately been given no cluster IP.
pub const CLUSTER_IP_NONE: &str = "None";

/// Annotation carrying a JSON map of endpoint IP to [`HostRecord`].
pub const HOSTNAMES_ANNOTATION: &str = "endpoints.cluster-dns.io/hostnames-map";

/// Build the canonical `namespace/name` store key.
pub fn object_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// A service as materialized by the control-plane catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Namespace the service lives in.
    pub namespace: String,
    /// Service name.
    pub name: String,
    /// Virtual cluster IP, [`CLUSTER_IP_NONE`], or empty when unassigned.
    #[serde(default, rename = "clusterIP")]
    pub cluster_ip: String,
    /// Declared service ports.
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

impl Service {
    /// Whether the service exposes a stable virtual IP. Services without one
    /// are headless and resolve to their endpoint IPs instead.
    pub fn has_cluster_ip(&self) -> bool {
        !self.cluster_ip.is_empty() && self.cluster_ip != CLUSTER_IP_NONE
    }
}

/// A single declared port of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    /// Port name; empty for unnamed ports (no SRV record is derived).
    #[serde(default)]
    pub name: String,
    /// Port number.
    pub port: u16,
    /// Transport protocol, e.g. "TCP" or "UDP".
    #[serde(default)]
    pub protocol: String,
}

/// The endpoints object backing a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Namespace, matching the owning service.
    pub namespace: String,
    /// Name, matching the owning service.
    pub name: String,
    /// Object annotations, notably [`HOSTNAMES_ANNOTATION`].
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Groups of addresses sharing a port definition.
    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
}

/// A group of (addresses, ports) sharing the same port definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSubset {
    /// Backing addresses.
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
    /// Ports served by every address in this subset.
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

/// One backing address of an endpoints subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    /// IPv4 address literal.
    pub ip: String,
    /// Explicit hostname for this address; empty when unset.
    #[serde(default)]
    pub hostname: String,
}

/// One port of an endpoints subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPort {
    /// Port name; empty for unnamed ports (no SRV record is derived).
    #[serde(default)]
    pub name: String,
    /// Port number.
    pub port: u16,
    /// Transport protocol, e.g. "TCP" or "UDP".
    #[serde(default)]
    pub protocol: String,
}

/// Hostname mapping entry carried by [`HOSTNAMES_ANNOTATION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Hostname to use as the endpoint's DNS label.
    #[serde(rename = "HostName")]
    pub host_name: String,
}

/// Objects addressable by their `namespace/name` key.
pub trait KeyedObject {
    /// Namespace of the object.
    fn namespace(&self) -> &str;
    /// Name of the object.
    fn name(&self) -> &str;
    /// Canonical `namespace/name` store key.
    fn key(&self) -> String {
        object_key(self.namespace(), self.name())
    }
}

impl KeyedObject for Service {
    fn namespace(&self) -> &str {
        &self.namespace
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl KeyedObject for Endpoints {
    fn namespace(&self) -> &str {
        &self.namespace
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Read-only lookup into the control-plane catalog, keyed `namespace/name`.
pub trait ObjectStore<T>: Send + Sync {
    /// Fetch the object stored under `key`, if any.
    fn get_by_key(&self, key: &str) -> Option<T>;
}

/// In-memory [`ObjectStore`] kept current by the watch layer.
#[derive(Debug)]
pub struct MemoryStore<T> {
    objects: RwLock<HashMap<String, T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl<T: KeyedObject> MemoryStore<T> {
    /// Insert or replace an object under its `namespace/name` key.
    pub fn insert(&self, object: T) {
        let key = object.key();
        self.objects.write().insert(key, object);
    }

    /// Remove the object stored under `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.objects.write().remove(key).is_some()
    }
}

impl<T: Clone + Send + Sync> ObjectStore<T> for MemoryStore<T> {
    fn get_by_key(&self, key: &str) -> Option<T> {
        self.objects.read().get(key).cloned()
    }
}

/// An object delivered by a catalog watch stream.
#[derive(Debug, Clone)]
pub enum CatalogObject {
    /// A service object.
    Service(Service),
    /// An endpoints object.
    Endpoints(Endpoints),
}

impl CatalogObject {
    /// Kind label used in logs and error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogObject::Service(_) => "service",
            CatalogObject::Endpoints(_) => "endpoints",
        }
    }
}

/// A change notification from the control-plane watch layer.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The object was created.
    Added(CatalogObject),
    /// The object was modified.
    Updated {
        /// Previous state of the object.
        old: CatalogObject,
        /// Current state of the object.
        new: CatalogObject,
    },
    /// The object was removed.
    Deleted(CatalogObject),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(namespace: &str, name: &str, cluster_ip: &str) -> Service {
        Service {
            namespace: namespace.to_string(),
            name: name.to_string(),
            cluster_ip: cluster_ip.to_string(),
            ports: vec![],
        }
    }

    #[test]
    fn test_has_cluster_ip() {
        assert!(service("default", "web", "10.0.0.1").has_cluster_ip());
        assert!(!service("default", "web", CLUSTER_IP_NONE).has_cluster_ip());
        assert!(!service("default", "web", "").has_cluster_ip());
    }

    #[test]
    fn test_store_round_trip() {
        let store = MemoryStore::new();
        store.insert(service("default", "web", "10.0.0.1"));

        assert_eq!(store.len(), 1);
        let found = store.get_by_key("default/web").unwrap();
        assert_eq!(found.cluster_ip, "10.0.0.1");
        assert!(store.get_by_key("default/other").is_none());

        assert!(store.remove("default/web"));
        assert!(!store.remove("default/web"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_replaces_by_key() {
        let store = MemoryStore::new();
        store.insert(service("default", "web", "10.0.0.1"));
        store.insert(service("default", "web", "10.0.0.2"));

        assert_eq!(store.len(), 1);
        let found: Option<Service> = store.get_by_key("default/web");
        assert_eq!(found.unwrap().cluster_ip, "10.0.0.2");
    }

    #[test]
    fn test_service_deserializes_catalog_json() {
        let service: Service = serde_json::from_str(
            r#"{
                "namespace": "default",
                "name": "web",
                "clusterIP": "10.0.0.1",
                "ports": [{"name": "http", "port": 80, "protocol": "TCP"}]
            }"#,
        )
        .unwrap();

        assert!(service.has_cluster_ip());
        assert_eq!(service.ports.len(), 1);
        assert_eq!(service.ports[0].name, "http");
        assert_eq!(service.ports[0].port, 80);
    }

    #[test]
    fn test_endpoints_deserializes_with_defaults() {
        let endpoints: Endpoints =
            serde_json::from_str(r#"{"namespace": "default", "name": "web"}"#).unwrap();

        assert!(endpoints.subsets.is_empty());
        assert!(endpoints.annotations.is_empty());
        assert_eq!(endpoints.key(), "default/web");
    }

    #[test]
    fn test_host_record_annotation_shape() {
        let hostnames: HashMap<String, HostRecord> =
            serde_json::from_str(r#"{"10.0.0.1": {"HostName": "web-0"}}"#).unwrap();

        assert_eq!(hostnames["10.0.0.1"].host_name, "web-0");
    }
}

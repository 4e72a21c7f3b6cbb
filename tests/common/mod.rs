//! Shared test infrastructure for the record engine integration tests.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use cluster_dns::catalog::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, MemoryStore, Service, ServicePort,
};
use cluster_dns::{ClusterDns, DnsRecord};

// --- Constants ---

pub const TEST_DOMAIN: &str = "cluster.local.";
pub const TEST_SERVICE: &str = "testservice";
pub const TEST_NAMESPACE: &str = "default";

// --- Engine construction ---

/// An engine wired to in-memory catalog stores, as the watch layer would
/// assemble it.
pub struct TestCluster {
    pub dns: ClusterDns,
    pub services: Arc<MemoryStore<Service>>,
    pub endpoints: Arc<MemoryStore<Endpoints>>,
}

pub fn new_cluster() -> TestCluster {
    let services: Arc<MemoryStore<Service>> = Arc::new(MemoryStore::new());
    let endpoints: Arc<MemoryStore<Endpoints>> = Arc::new(MemoryStore::new());
    let dns = ClusterDns::new(TEST_DOMAIN, services.clone(), endpoints.clone());
    TestCluster {
        dns,
        services,
        endpoints,
    }
}

// --- Object builders ---

pub fn new_service(
    namespace: &str,
    name: &str,
    cluster_ip: &str,
    port_name: &str,
    port: u16,
) -> Service {
    Service {
        namespace: namespace.to_string(),
        name: name.to_string(),
        cluster_ip: cluster_ip.to_string(),
        ports: vec![ServicePort {
            name: port_name.to_string(),
            port,
            protocol: "TCP".to_string(),
        }],
    }
}

pub fn new_headless_service() -> Service {
    Service {
        namespace: TEST_NAMESPACE.to_string(),
        name: TEST_SERVICE.to_string(),
        cluster_ip: "None".to_string(),
        ports: vec![ServicePort {
            name: String::new(),
            port: 0,
            protocol: String::new(),
        }],
    }
}

pub fn new_endpoints(service: &Service, subsets: Vec<EndpointSubset>) -> Endpoints {
    Endpoints {
        namespace: service.namespace.clone(),
        name: service.name.clone(),
        annotations: HashMap::new(),
        subsets,
    }
}

pub fn subset_with_one_port(port_name: &str, port: u16, ips: &[&str]) -> EndpointSubset {
    EndpointSubset {
        addresses: ips
            .iter()
            .map(|ip| EndpointAddress {
                ip: ip.to_string(),
                hostname: String::new(),
            })
            .collect(),
        ports: vec![EndpointPort {
            name: port_name.to_string(),
            port,
            protocol: "TCP".to_string(),
        }],
    }
}

pub fn subset_with_two_ports(
    port_name1: &str,
    port1: u16,
    port_name2: &str,
    port2: u16,
    ips: &[&str],
) -> EndpointSubset {
    let mut subset = subset_with_one_port(port_name1, port1, ips);
    subset.ports.push(EndpointPort {
        name: port_name2.to_string(),
        port: port2,
        protocol: "TCP".to_string(),
    });
    subset
}

// --- Name construction ---

pub fn service_fqdn(service: &Service) -> String {
    format!(
        "{}.{}.svc.{}",
        service.name, service.namespace, TEST_DOMAIN
    )
}

pub fn srv_fqdn(service: &Service, port_name: &str) -> String {
    format!("_{}._tcp.{}", port_name, service_fqdn(service))
}

/// The five query forms that must resolve a portal service identically.
pub fn equivalent_queries(service: &Service) -> Vec<String> {
    let fqdn = service_fqdn(service);
    vec![
        fqdn.clone(),
        fqdn.replacen(".svc.", ".*.", 1),
        fqdn.replacen(&service.namespace, "*", 1),
        fqdn.replacen(&service.namespace, "*", 1)
            .replacen(".svc.", ".*.", 1),
        format!("*.{fqdn}"),
    ]
}

// --- Assertion helpers ---

pub fn assert_records_for_cluster_ip(dns: &ClusterDns, service: &Service) {
    for query in equivalent_queries(service) {
        let records = dns
            .records(&query, false)
            .unwrap_or_else(|e| panic!("query {query} failed: {e}"));
        assert_eq!(records.len(), 1, "query {query}");
        assert_eq!(records[0].host, service.cluster_ip, "query {query}");
    }
}

pub fn assert_no_records_for_cluster_ip(dns: &ClusterDns, service: &Service) {
    for query in equivalent_queries(service) {
        assert!(
            dns.records(&query, false).is_err(),
            "query {query} should find nothing"
        );
    }
}

pub fn assert_srv_for_named_port(dns: &ClusterDns, service: &Service, port_name: &str) {
    let query = srv_fqdn(service, port_name);
    let records = dns
        .records(&query, false)
        .unwrap_or_else(|e| panic!("query {query} failed: {e}"));
    assert_eq!(records.len(), 1, "query {query}");
    assert_eq!(records[0].host, service_fqdn(service), "query {query}");
}

pub fn assert_no_srv_for_named_port(dns: &ClusterDns, service: &Service, port_name: &str) {
    let query = srv_fqdn(service, port_name);
    assert!(
        dns.records(&query, false).is_err(),
        "query {query} should find nothing"
    );
}

/// One A record per distinct endpoint IP at the service FQDN.
pub fn assert_headless_records(dns: &ClusterDns, service: &Service, endpoints: &Endpoints) {
    let query = service_fqdn(service);
    let records = dns
        .records(&query, false)
        .unwrap_or_else(|e| panic!("query {query} failed: {e}"));

    let expected: std::collections::HashSet<&str> = endpoints
        .subsets
        .iter()
        .flat_map(|subset| subset.addresses.iter())
        .map(|address| address.ip.as_str())
        .collect();

    assert_eq!(records.len(), expected.len(), "query {query}");
    for record in &records {
        assert!(
            expected.contains(record.host.as_str()),
            "unexpected host {}",
            record.host
        );
    }
}

pub fn assert_no_headless_records(dns: &ClusterDns, service: &Service) {
    let query = service_fqdn(service);
    assert!(
        dns.records(&query, false).is_err(),
        "query {query} should find nothing"
    );
}

/// SRV records per named subset port, each resolving through one CNAME hop to
/// an IP of the subset carrying the port.
pub fn assert_srv_for_headless(dns: &ClusterDns, service: &Service, endpoints: &Endpoints) {
    for subset in &endpoints.subsets {
        for port in &subset.ports {
            if port.name.is_empty() {
                continue;
            }
            let query = srv_fqdn(service, &port.name);
            let records = dns
                .records(&query, false)
                .unwrap_or_else(|e| panic!("query {query} failed: {e}"));

            assert_eq!(records.len(), subset.addresses.len(), "query {query}");
            let subset_ips: std::collections::HashSet<&str> = subset
                .addresses
                .iter()
                .map(|address| address.ip.as_str())
                .collect();
            for record in &records {
                assert_eq!(record.port, port.port, "query {query}");
                let ip = ip_for_cname(dns, &record.host);
                assert!(subset_ips.contains(ip.as_str()), "host {}", record.host);
            }
        }
    }
}

/// Resolve a CNAME target one hop and return the single A record's IP.
pub fn ip_for_cname(dns: &ClusterDns, cname: &str) -> String {
    let records: Vec<Arc<DnsRecord>> = dns
        .records(cname, false)
        .unwrap_or_else(|e| panic!("CNAME target {cname} failed: {e}"));
    assert_eq!(records.len(), 1, "CNAME target {cname}");
    assert!(
        records[0].host.parse::<Ipv4Addr>().is_ok(),
        "invalid IP {}",
        records[0].host
    );
    records[0].host.clone()
}

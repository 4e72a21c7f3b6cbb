//! Record values and the service-to-record synthesizers.
//!
//! Synthesis is pure: both builders return a freshly assembled [`TreeCache`]
//! subtree and never touch the live cache. The resolver swaps the result in
//! wholesale under its write lock, which is what makes service updates and
//! endpoint churn atomic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::TreeCache;
use crate::catalog::{EndpointAddress, Endpoints, HostRecord, Service, HOSTNAMES_ANNOTATION};
use crate::error::DnsError;

/// Subdomain under which all service records live.
pub const SERVICE_SUBDOMAIN: &str = "svc";

/// Subdomain under which pod records are synthesized.
pub const POD_SUBDOMAIN: &str = "pod";

/// Fixed priority carried by every record.
pub const RECORD_PRIORITY: u16 = 10;

/// Fixed weight carried by every record.
pub const RECORD_WEIGHT: u16 = 10;

/// Fixed TTL carried by every record; not expired by time at this layer.
pub const RECORD_TTL: u32 = 30;

/// A record as returned to the DNS front-end. `host` is either an IPv4
/// literal (A) or a target name (CNAME/SRV target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// IPv4 literal or target name.
    pub host: String,
    /// Port number; 0 when unused.
    pub port: u16,
    /// Always [`RECORD_PRIORITY`].
    pub priority: u16,
    /// Always [`RECORD_WEIGHT`].
    pub weight: u16,
    /// Always [`RECORD_TTL`].
    pub ttl: u32,
}

/// Materialize a record for `host`/`port` with the fixed attribute contract.
/// The FNV-1a hash of the printable form is logged for cross-referencing
/// cache dumps with query logs.
pub fn new_record(host: impl Into<String>, port: u16) -> Arc<DnsRecord> {
    let record = DnsRecord {
        host: host.into(),
        port,
        priority: RECORD_PRIORITY,
        weight: RECORD_WEIGHT,
        ttl: RECORD_TTL,
    };
    let hash = fnv1a32(format!("{record:?}").as_bytes());
    debug!(host = %record.host, port = record.port, hash = %format_args!("{hash:x}"), "materialized record");
    Arc::new(record)
}

const FNV1A_OFFSET: u32 = 0x811c_9dc5;
const FNV1A_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(FNV1A_OFFSET, |hash, byte| (hash ^ u32::from(*byte)).wrapping_mul(FNV1A_PRIME))
}

/// Fully-qualified name of a service: `<name>.<namespace>.svc.<domain>`.
pub fn service_fqdn(name: &str, namespace: &str, domain: &str) -> String {
    format!("{name}.{namespace}.{SERVICE_SUBDOMAIN}.{domain}")
}

/// Whether `label` is a valid lowercase DNS label (RFC 1123).
pub fn is_dns_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    label.starts_with(alnum)
        && label.ends_with(alnum)
        && label.chars().all(|c| alnum(c) || c == '-')
}

/// The leftmost DNS label identifying an endpoint address: its explicit
/// hostname, else a valid annotation-provided hostname, else the
/// dash-encoded IP (`10.0.0.1` -> `10-0-0-1`).
pub fn endpoint_label(address: &EndpointAddress, hostnames: &HashMap<String, HostRecord>) -> String {
    if !address.hostname.is_empty() {
        return address.hostname.clone();
    }
    if let Some(record) = hostnames.get(&address.ip) {
        if is_dns_label(&record.host_name) {
            return record.host_name.clone();
        }
    }
    address.ip.replace('.', "-")
}

/// Parse the endpoint hostnames annotation. A missing or empty annotation is
/// an empty map; invalid JSON fails synthesis.
pub fn hostnames_from_annotations(
    annotations: &HashMap<String, String>,
) -> Result<HashMap<String, HostRecord>, DnsError> {
    match annotations.get(HOSTNAMES_ANNOTATION) {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(raw).map_err(|e| DnsError::MalformedAnnotation(e.to_string()))
        }
        _ => Ok(HashMap::new()),
    }
}

/// Build the record subtree for a portal service: one A-entry for the
/// cluster IP at the subtree root, plus one SRV-entry per named,
/// protocoled port under `_<proto>/_<name>`.
pub fn portal_subtree(service: &Service, domain: &str) -> TreeCache {
    let mut sub = TreeCache::new();
    sub.set_entry(&service.name, new_record(&service.cluster_ip, 0), &[]);

    let fqdn = service_fqdn(&service.name, &service.namespace, domain);
    for port in &service.ports {
        if port.name.is_empty() || port.protocol.is_empty() {
            continue;
        }
        let proto = format!("_{}", port.protocol.to_lowercase());
        let name = format!("_{}", port.name);
        sub.set_entry(
            &service.name,
            new_record(fqdn.clone(), port.port),
            &[proto.as_str(), name.as_str()],
        );
    }
    sub
}

/// Build the record subtree for a headless service from its endpoints: one
/// A-entry per address keyed by its endpoint label, plus per-address
/// SRV-entries for every named, protocoled subset port, each pointing at the
/// address's own A name.
pub fn headless_subtree(
    service: &Service,
    endpoints: &Endpoints,
    domain: &str,
) -> Result<TreeCache, DnsError> {
    let hostnames = hostnames_from_annotations(&endpoints.annotations)?;
    let fqdn = service_fqdn(&service.name, &service.namespace, domain);

    let mut sub = TreeCache::new();
    for subset in &endpoints.subsets {
        for address in &subset.addresses {
            let label = endpoint_label(address, &hostnames);
            sub.set_entry(&label, new_record(&address.ip, 0), &[]);

            for port in &subset.ports {
                if port.name.is_empty() || port.protocol.is_empty() {
                    continue;
                }
                let proto = format!("_{}", port.protocol.to_lowercase());
                let name = format!("_{}", port.name);
                sub.set_entry(
                    &label,
                    new_record(format!("{label}.{fqdn}"), port.port),
                    &[proto.as_str(), name.as_str()],
                );
            }
        }
    }
    Ok(sub)
}

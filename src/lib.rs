//! Cluster DNS - a cluster-internal authoritative DNS engine backed by the
//! control-plane service and endpoint catalogs.
//!
//! This crate materializes DNS records for the services of a
//! container-orchestration cluster: portal services resolve to their stable
//! virtual IP, headless services enumerate their backing endpoint IPs, and
//! pod names carrying a dash-encoded IP are synthesized on the fly. Records
//! live in an in-memory label tree that is reconciled against catalog change
//! events in real time.
//!
//! ## Features
//!
//! - A, CNAME-target, and SRV record sets for portal and headless services
//! - Wildcard queries (`web.*.svc.cluster.local`) as a natural tree descent
//! - Atomic whole-subtree replacement on every service or endpoint change
//! - Concurrent reads under a single reader-writer lock
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          cluster-dns                            │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                   │
//! │  │   CatalogSync    │───▶│    ClusterDns    │                   │
//! │  │ (watch streams)  │    │   (reconciler)   │                   │
//! │  └──────────────────┘    └────────┬─────────┘                   │
//! │         │                         │                             │
//! │         │ services                ▼                             │
//! │         │ endpoints          ┌──────────────────┐               │
//! │         │                    │    TreeCache     │◀── records()  │
//! │         │                    │ (reversed labels)│               │
//! │         └───────────────────▶└──────────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The control-plane list/watch client and the DNS wire server live outside
//! this crate: the engine consumes typed [`catalog::WatchEvent`] streams and
//! exposes [`ClusterDns::records`] to the front-end.
//!
//! ## Name resolution
//!
//! ```text
//! web.default.svc.cluster.local
//!   → reverse the labels, walk local → cluster → svc → default
//!   → portal: the service's A entry; headless: one A entry per endpoint
//! _http._tcp.web.default.svc.cluster.local
//!   → SRV entries under the service node
//! 10-0-0-1.default.pod.cluster.local
//!   → A record synthesized from the dash-encoded IP
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use cluster_dns::catalog::MemoryStore;
//! use cluster_dns::{CatalogSync, ClusterDns};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let services = Arc::new(MemoryStore::new());
//!     let endpoints = Arc::new(MemoryStore::new());
//!     let dns = ClusterDns::new("cluster.local.", services.clone(), endpoints.clone());
//!
//!     let pump = CatalogSync::new(dns.clone(), services, endpoints);
//!     tokio::spawn(pump.run(service_watch, endpoint_watch));
//!
//!     dns.wait_until_ready().await;
//!     let records = dns.records("web.default.svc.cluster.local.", false)?;
//! }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod records;
pub mod resolver;
pub mod sync;
pub mod telemetry;

// Re-export main types
pub use cache::TreeCache;
pub use config::{Config, DnsConfig, TelemetryConfig};
pub use error::DnsError;
pub use records::DnsRecord;
pub use resolver::ClusterDns;
pub use sync::CatalogSync;

//! Metrics instrumentation for cluster-dns.
//!
//! All metrics are prefixed with `cluster_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a resolver query.
pub fn record_query(kind: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NotFound => "not_found",
        QueryResult::InvalidIp => "invalid_ip",
    };

    counter!("cluster_dns.query.count", "kind" => kind.to_string(), "result" => result_str)
        .increment(1);
    histogram!("cluster_dns.query.duration.seconds", "kind" => kind.to_string())
        .record(duration.as_secs_f64());
}

/// Query outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records.
    Success,
    /// Query resolved to zero records.
    NotFound,
    /// Pod query carried an unparseable dash-encoded IP.
    InvalidIp,
}

/// Record the number of records returned by a successful query.
pub fn record_records_returned(count: usize) {
    histogram!("cluster_dns.query.records_returned").record(count as f64);
}

/// Record a reconciled catalog event.
pub fn record_sync_event(resource: &str, event: SyncEventType) {
    let event_str = match event {
        SyncEventType::Add => "add",
        SyncEventType::Update => "update",
        SyncEventType::Delete => "delete",
    };

    counter!("cluster_dns.sync.event.count", "resource" => resource.to_string(), "event" => event_str)
        .increment(1);
}

/// Catalog event types.
#[derive(Debug, Clone, Copy)]
pub enum SyncEventType {
    /// Object created.
    Add,
    /// Object modified.
    Update,
    /// Object removed.
    Delete,
}

/// Record a whole-subtree swap in the record cache.
pub fn record_subtree_swap(kind: &str) {
    counter!("cluster_dns.cache.subtree_swap.count", "kind" => kind.to_string()).increment(1);
}

/// Record a synthesis failure (the cache is left unchanged).
pub fn record_synthesis_failure() {
    counter!("cluster_dns.synthesis.failure.count").increment(1);
}

/// Record an object of the wrong kind arriving on a typed watch stream.
pub fn record_type_assertion_failure(stream: &str) {
    counter!("cluster_dns.sync.type_assertion.count", "stream" => stream.to_string()).increment(1);
}

/// Record the total number of cached records.
pub fn record_cache_entries(count: usize) {
    gauge!("cluster_dns.cache.entries").set(count as f64);
}

/// Record readiness of the engine.
pub fn record_ready_state(ready: bool) {
    gauge!("cluster_dns.ready").set(if ready { 1.0 } else { 0.0 });
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

//! Error types for cluster-dns.

use thiserror::Error;

/// Errors surfaced by the record cache and resolver.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The query resolved to zero records.
    #[error("no records found for {name}")]
    NotFound {
        /// The query name that produced no records.
        name: String,
    },

    /// A putative pod record's dash-encoded IP does not parse.
    #[error("invalid pod IP address {0}")]
    InvalidIp(String),

    /// The requested operation is not supported by this zone.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// The endpoint hostnames annotation carries invalid JSON.
    #[error("malformed endpoint hostnames annotation: {0}")]
    MalformedAnnotation(String),

    /// An object of the wrong kind arrived on a typed watch stream.
    #[error("expected a {expected} object, got {got}")]
    TypeAssertion {
        /// The kind the stream is supposed to deliver.
        expected: &'static str,
        /// The kind that actually arrived.
        got: &'static str,
    },

    /// Rendering the cache as JSON failed.
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by instrumentator construction and metric registration.
///
/// Per-request instrumentation never returns these to the caller: failures
/// inside metric updaters are logged at the middleware boundary and the
/// response is passed through unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// An exclusion pattern failed to compile. Raised at construction time so
    /// a bad pattern can never reach request handling.
    #[error("invalid exclusion pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Metric creation or registration was rejected by the Prometheus client,
    /// e.g. a duplicate metric name in the same registry.
    #[error("metric registration failed: {0}")]
    Metric(#[from] prometheus::Error),
}

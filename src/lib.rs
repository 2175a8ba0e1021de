//! Library exports for promotron, shared between the binary and tests.
//!
//! The core is the [`Instrumentator`]: middleware for axum services that
//! measures every request, classifies it by route template and status
//! class, and feeds the resulting [`Info`] snapshot to an ordered registry
//! of [`MetricUpdater`]s backed by a Prometheus registry.

pub mod config;
pub mod error;
pub mod instrument;
pub mod metrics;
pub mod routes;
pub mod startup;
pub mod utils;

pub use error::Error;
pub use instrument::{Info, Instrumentator, Options};
pub use metrics::MetricUpdater;

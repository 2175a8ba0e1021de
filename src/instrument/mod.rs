//! The instrumentation pipeline: per-request snapshotting, label
//! resolution and the orchestrator that drives registered metric updaters.

mod hook;
mod info;
mod instrumentator;
mod resolve;

pub use info::{clamp_size, content_length, round_seconds, Info};
pub use instrumentator::{Instrumentator, Options};
pub use resolve::{resolve_handler, status_label, ResolvedHandler, UNTEMPLATED_HANDLER};

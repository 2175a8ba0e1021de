//! The middleware hook attached to the host router.
//!
//! One hook instance serves every request; it wraps the inner service,
//! measures timing, applies the exclusion decision, builds the [`Info`]
//! snapshot and drives the frozen updater registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderMap, Method, StatusCode};
use regex::Regex;
use tracing::{error, warn};

use super::info::{clamp_size, content_length, round_seconds, Info};
use super::resolve::{resolve_handler, status_label, ResolvedHandler};
use crate::metrics::BoxedUpdater;

/// The registry and resolution policy frozen at `instrument()` time.
///
/// Shared behind an `Arc` by every in-flight request; all fields are
/// read-only after construction, so traversal needs no locking.
pub(crate) struct Pipeline {
    pub updaters: Vec<BoxedUpdater>,
    pub excluded: Vec<Regex>,
    pub should_group_status_codes: bool,
    pub should_ignore_untemplated: bool,
    pub should_group_untemplated: bool,
    pub should_ignore_redirects: bool,
    pub round_latency_decimals: Option<u32>,
    pub body_size_limit: Option<u64>,
}

/// Per-request middleware entry point.
///
/// Captures the request-side fields before delegating to the inner
/// service, then records metrics off the finished response. If the inner
/// future is dropped before a response exists, no snapshot is built and
/// no metrics are updated.
pub(crate) async fn track(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let raw_path = request.uri().path().to_string();
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());
    let request_headers = request.headers().clone();

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    pipeline.record(method, raw_path, matched, request_headers, &response, elapsed);

    response
}

impl Pipeline {
    /// Runs steps 3-6 of the per-request algorithm: exclusion decision,
    /// resolution, snapshot construction and registry execution. The
    /// response itself is never touched.
    fn record(
        &self,
        method: Method,
        raw_path: String,
        matched: Option<String>,
        request_headers: HeaderMap,
        response: &Response,
        elapsed: Duration,
    ) {
        if self.should_ignore_redirects && response.status().is_redirection() {
            return;
        }

        let resolved = resolve_handler(
            matched.as_deref(),
            &raw_path,
            self.should_ignore_untemplated,
            self.should_group_untemplated,
        );
        if resolved == ResolvedHandler::Ignored {
            return;
        }
        if self.is_excluded(resolved.label(), &raw_path) {
            return;
        }

        let info = self.build_info(method, raw_path, resolved, request_headers, response, elapsed);
        self.run_updaters(&info);
    }

    /// First matching pattern wins; patterns are checked against both the
    /// resolved handler label and the raw path.
    fn is_excluded(&self, handler: &str, raw_path: &str) -> bool {
        self.excluded
            .iter()
            .any(|pattern| pattern.is_match(handler) || pattern.is_match(raw_path))
    }

    fn build_info(
        &self,
        method: Method,
        raw_path: String,
        resolved: ResolvedHandler,
        request_headers: HeaderMap,
        response: &Response,
        elapsed: Duration,
    ) -> Info {
        let status: StatusCode = response.status();
        Info {
            handler: resolved.label().to_string(),
            status_label: status_label(status, self.should_group_status_codes),
            status,
            duration_seconds: round_seconds(elapsed.as_secs_f64(), self.round_latency_decimals),
            request_size: clamp_size(content_length(&request_headers), self.body_size_limit),
            response_size: clamp_size(content_length(response.headers()), self.body_size_limit),
            response_headers: response.headers().clone(),
            request_headers,
            method,
            raw_path,
        }
    }

    /// Invokes every updater in registration order with the same snapshot.
    ///
    /// Contract: log-and-continue. An error or panic in one updater is
    /// reported here and swallowed; the remaining updaters still run and
    /// the original response is returned unchanged.
    fn run_updaters(&self, info: &Info) {
        for updater in &self.updaters {
            match catch_unwind(AssertUnwindSafe(|| updater.update(info))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, handler = %info.handler, "metric updater failed");
                }
                Err(_) => {
                    error!(handler = %info.handler, "metric updater panicked");
                }
            }
        }
    }
}

//! The orchestrator owning the metric registry and its lifecycle.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use prometheus::{Encoder, Registry, TextEncoder};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::hook::{self, Pipeline};
use crate::error::Error;
use crate::metrics::{self, BoxedUpdater, DefaultOptions, MetricNaming};

fn default_env_var_name() -> String {
    "ENABLE_METRICS".to_string()
}

fn default_true() -> bool {
    true
}

/// Instrumentator configuration, immutable once the middleware is attached.
///
/// Deserializable so a service can carry it in its YAML config; every field
/// has a default, so an empty `instrumentation: {}` section yields the
/// documented default behavior.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct Options {
    /// Collapse status codes to their hundreds class in the `status` label.
    pub should_group_status_codes: bool,
    /// Skip instrumentation entirely for requests that matched no route.
    pub should_ignore_untemplated: bool,
    /// Group unmatched requests under the `"none"` handler label instead of
    /// the raw path. Only consulted when `should_ignore_untemplated` is off.
    pub should_group_untemplated: bool,
    /// Gate `instrument()` and `expose()` on the activation env var.
    pub should_respect_env_var: bool,
    /// Name of the activation env var; `"true"` (case-insensitive) or `"1"`
    /// open the gate.
    pub env_var_name: String,
    /// Skip instrumentation for 3xx responses.
    pub should_ignore_redirects: bool,
    /// Exclusion patterns, matched against the resolved handler label and
    /// the raw path. First match excludes the request.
    pub excluded_handlers: Vec<String>,
    /// Round observed durations to this many decimal places.
    pub round_latency_decimals: Option<u32>,
    /// Cap observed body sizes at this many bytes.
    pub body_size_limit: Option<u64>,
    /// Namespace for the injected default metric's names.
    pub metric_namespace: String,
    /// Subsystem for the injected default metric's names.
    pub metric_subsystem: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            should_group_status_codes: default_true(),
            should_ignore_untemplated: false,
            should_group_untemplated: default_true(),
            should_respect_env_var: false,
            env_var_name: default_env_var_name(),
            should_ignore_redirects: false,
            excluded_handlers: Vec::new(),
            round_latency_decimals: None,
            body_size_limit: None,
            metric_namespace: String::new(),
            metric_subsystem: String::new(),
        }
    }
}

/// Orchestrates HTTP instrumentation for an axum router.
///
/// Lifecycle: construct (`Configured`), register custom updaters with
/// [`add`](Self::add), attach the middleware with
/// [`instrument`](Self::instrument) (`Instrumented`), and register the
/// exposition endpoint with [`expose`](Self::expose) (`Exposed`). The two
/// attached states are independent; either can be reached without the
/// other.
pub struct Instrumentator {
    options: Options,
    excluded: Vec<Regex>,
    registry: Registry,
    updaters: Vec<BoxedUpdater>,
    instrumented: bool,
    exposed: bool,
}

impl Instrumentator {
    /// Creates an instrumentator with its own Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if any exclusion pattern is not a valid
    /// regular expression. Patterns are compiled here so configuration
    /// mistakes surface at construction, never at request time.
    pub fn new(options: Options) -> Result<Self, Error> {
        let excluded = options
            .excluded_handlers
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| Error::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Instrumentator {
            options,
            excluded,
            registry: Registry::new(),
            updaters: Vec::new(),
            instrumented: false,
            exposed: false,
        })
    }

    /// Creates an instrumentator with default options.
    pub fn with_defaults() -> Self {
        Self::new(Options::default()).expect("default options contain no patterns")
    }

    /// The registry all updaters created through this instrumentator
    /// register into. Exposition gathers from it.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether the middleware hook has been attached.
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    /// Whether the exposition endpoint has been registered.
    pub fn is_exposed(&self) -> bool {
        self.exposed
    }

    /// Registers a metric updater.
    ///
    /// The factory runs immediately against this instrumentator's registry,
    /// creating its persistent metric objects once; the returned updater is
    /// appended to the registry and invoked for every instrumented request
    /// in registration order.
    ///
    /// # Errors
    ///
    /// Propagates metric registration failures from the factory.
    ///
    /// # Panics
    ///
    /// Panics if called after a successful [`instrument`](Self::instrument):
    /// the registry is already frozen into the running middleware, so a
    /// late registration is a logic bug that must not be dropped silently.
    pub fn add<F>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        F: FnOnce(&Registry) -> Result<BoxedUpdater, Error>,
    {
        assert!(
            !self.instrumented,
            "add() called after instrument(); the updater registry is frozen once the middleware is attached"
        );
        let updater = factory(&self.registry)?;
        self.updaters.push(updater);
        Ok(self)
    }

    /// Attaches the instrumentation middleware to `router`.
    ///
    /// If the activation gate is closed this is a no-op and the state stays
    /// `Configured`. Otherwise the updater registry is frozen (injecting
    /// the default duration metric iff nothing was registered) and a
    /// single hook is layered onto the router. Idempotent: a second call
    /// warns and returns the router unchanged, so no request is ever
    /// processed by the registry twice.
    ///
    /// Routes added to the returned router afterwards are not wrapped by
    /// the hook; attach the exposition endpoint after instrumenting to keep
    /// scrapes out of the metrics.
    pub fn instrument(&mut self, router: Router) -> Router {
        if !self.gate_open() {
            debug!(
                env_var = %self.options.env_var_name,
                "activation gate closed, instrumentation not attached"
            );
            return router;
        }
        if self.instrumented {
            warn!("instrument() called twice, middleware already attached");
            return router;
        }

        if self.updaters.is_empty() {
            let factory = metrics::default(DefaultOptions {
                naming: MetricNaming {
                    name: None,
                    namespace: self.options.metric_namespace.clone(),
                    subsystem: self.options.metric_subsystem.clone(),
                },
                ..DefaultOptions::default()
            });
            let updater = factory(&self.registry)
                .expect("default metric registration on an empty registry cannot collide");
            self.updaters.push(updater);
        }

        let pipeline = Arc::new(Pipeline {
            updaters: std::mem::take(&mut self.updaters),
            excluded: self.excluded.clone(),
            should_group_status_codes: self.options.should_group_status_codes,
            should_ignore_untemplated: self.options.should_ignore_untemplated,
            should_group_untemplated: self.options.should_group_untemplated,
            should_ignore_redirects: self.options.should_ignore_redirects,
            round_latency_decimals: self.options.round_latency_decimals,
            body_size_limit: self.options.body_size_limit,
        });
        self.instrumented = true;

        router.layer(middleware::from_fn_with_state(pipeline, hook::track))
    }

    /// Registers the exposition endpoint at `path` (GET only).
    ///
    /// Renders the live state of all registered metric objects in the
    /// Prometheus text format. Subject to the same activation gate as
    /// [`instrument`](Self::instrument); independent of it otherwise.
    pub fn expose(&mut self, router: Router, path: &str) -> Router {
        if !self.gate_open() {
            debug!(
                env_var = %self.options.env_var_name,
                "activation gate closed, exposition endpoint not registered"
            );
            return router;
        }

        let registry = self.registry.clone();
        self.exposed = true;

        router.route(
            path,
            get(move || {
                let registry = registry.clone();
                async move { render(&registry) }
            }),
        )
    }

    /// Evaluates the activation gate against the process environment.
    /// Called once per attachment/exposition call, never per request.
    fn gate_open(&self) -> bool {
        self.gate_open_with(|name| std::env::var(name).ok())
    }

    /// Gate check over an injected lookup, so tests need no environment
    /// mutation.
    fn gate_open_with<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.options.should_respect_env_var {
            return true;
        }
        match lookup(&self.options.env_var_name) {
            Some(value) => value.eq_ignore_ascii_case("true") || value == "1",
            None => false,
        }
    }
}

/// Renders the registry in the Prometheus text exposition format.
fn render(registry: &Registry) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }

    match String::from_utf8(buffer) {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "metrics encoding produced invalid UTF-8");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response()
        }
    }
}

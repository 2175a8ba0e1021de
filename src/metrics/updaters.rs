//! Metric updaters and the factories that build them.
//!
//! An updater pairs persistent Prometheus metric objects, created once at
//! registration time, with a per-request `update` that reads an [`Info`]
//! snapshot and records observations. The shipped factories cover request
//! counts, latencies, and payload sizes; custom updaters implement
//! [`MetricUpdater`] and are registered through
//! [`Instrumentator::add`](crate::instrument::Instrumentator::add).

use http::{header, HeaderMap};
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_histogram_with_registry, CounterVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry,
};

use crate::error::Error;
use crate::instrument::Info;

/// Duration buckets for the low-cardinality default latency histogram.
pub const LATENCY_LOWR_BUCKETS: &[f64] = &[0.1, 0.5, 1.0];

/// Duration buckets for the high-resolution latency histogram.
pub const LATENCY_HIGHR_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0,
    7.5, 10.0, 30.0, 60.0,
];

/// Byte buckets for payload size histograms.
pub const SIZE_BUCKETS: &[f64] = &[
    64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0, 1048576.0, 4194304.0,
];

/// A per-request metric update.
///
/// Implementations own their metric objects and must tolerate unbounded
/// concurrent invocation; Prometheus metric types provide atomic updates,
/// so no further synchronization is required. A returned error (or a panic)
/// is logged at the middleware boundary and never affects the response or
/// sibling updaters.
pub trait MetricUpdater: Send + Sync {
    fn update(&self, info: &Info) -> Result<(), Error>;
}

/// Boxed updater as produced by the shipped factories.
pub type BoxedUpdater = Box<dyn MetricUpdater>;

/// Metric naming knobs shared by the shipped factories.
///
/// `namespace` and `subsystem` are prepended to the metric name the usual
/// Prometheus way (`namespace_subsystem_name`); empty components are
/// skipped. `name` overrides the factory's default base name.
#[derive(Debug, Clone, Default)]
pub struct MetricNaming {
    pub name: Option<String>,
    pub namespace: String,
    pub subsystem: String,
}

impl MetricNaming {
    fn opts(&self, default_name: &str, help: &str) -> Opts {
        Opts::new(
            self.name.clone().unwrap_or_else(|| default_name.to_string()),
            help,
        )
        .namespace(self.namespace.clone())
        .subsystem(self.subsystem.clone())
    }

    fn histogram_opts(&self, default_name: &str, help: &str, buckets: &[f64]) -> HistogramOpts {
        HistogramOpts::new(
            self.name.clone().unwrap_or_else(|| default_name.to_string()),
            help,
        )
        .namespace(self.namespace.clone())
        .subsystem(self.subsystem.clone())
        .buckets(buckets.to_vec())
    }
}

// --- Default metric -------------------------------------------------------

/// Configuration for the [`default`] updater.
#[derive(Debug, Clone)]
pub struct DefaultOptions {
    pub naming: MetricNaming,
    pub latency_lowr_buckets: Vec<f64>,
    pub latency_highr_buckets: Vec<f64>,
}

impl Default for DefaultOptions {
    fn default() -> Self {
        DefaultOptions {
            naming: MetricNaming::default(),
            latency_lowr_buckets: LATENCY_LOWR_BUCKETS.to_vec(),
            latency_highr_buckets: LATENCY_HIGHR_BUCKETS.to_vec(),
        }
    }
}

struct DefaultMetrics {
    duration: HistogramVec,
    duration_highr: Histogram,
}

impl MetricUpdater for DefaultMetrics {
    fn update(&self, info: &Info) -> Result<(), Error> {
        self.duration
            .with_label_values(&[&info.handler, info.method.as_str(), &info.status_label])
            .observe(info.duration_seconds);
        self.duration_highr.observe(info.duration_seconds);
        Ok(())
    }
}

/// The updater the instrumentator injects when nothing was registered.
///
/// Creates a low-cardinality duration histogram labeled by `handler`,
/// `method` and `status`, plus a separate unlabeled high-resolution
/// duration histogram for accurate percentile calculation across all
/// requests.
pub fn default(
    options: DefaultOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    move |registry| {
        let duration = register_histogram_vec_with_registry!(
            options.naming.histogram_opts(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
                &options.latency_lowr_buckets,
            ),
            &["handler", "method", "status"],
            registry.clone()
        )?;

        let duration_highr = register_histogram_with_registry!(
            options.naming.histogram_opts(
                "http_request_duration_highr_seconds",
                "Latency with many buckets but no API-specific labels",
                &options.latency_highr_buckets,
            ),
            registry.clone()
        )?;

        Ok(Box::new(DefaultMetrics {
            duration,
            duration_highr,
        }) as BoxedUpdater)
    }
}

// --- Latency --------------------------------------------------------------

/// Configuration for the [`latency`] updater.
#[derive(Debug, Clone)]
pub struct LatencyOptions {
    pub naming: MetricNaming,
    pub should_include_handler: bool,
    pub should_include_method: bool,
    pub should_include_status: bool,
    pub buckets: Vec<f64>,
}

impl Default for LatencyOptions {
    fn default() -> Self {
        LatencyOptions {
            naming: MetricNaming::default(),
            should_include_handler: true,
            should_include_method: true,
            should_include_status: true,
            buckets: LATENCY_LOWR_BUCKETS.to_vec(),
        }
    }
}

struct Latency {
    histogram: HistogramVec,
    include_handler: bool,
    include_method: bool,
    include_status: bool,
}

impl MetricUpdater for Latency {
    fn update(&self, info: &Info) -> Result<(), Error> {
        let mut values: Vec<&str> = Vec::with_capacity(3);
        if self.include_handler {
            values.push(&info.handler);
        }
        if self.include_method {
            values.push(info.method.as_str());
        }
        if self.include_status {
            values.push(&info.status_label);
        }
        self.histogram
            .with_label_values(&values)
            .observe(info.duration_seconds);
        Ok(())
    }
}

/// Request duration histogram with a configurable label set.
pub fn latency(
    options: LatencyOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    move |registry| {
        let mut labels: Vec<&str> = Vec::with_capacity(3);
        if options.should_include_handler {
            labels.push("handler");
        }
        if options.should_include_method {
            labels.push("method");
        }
        if options.should_include_status {
            labels.push("status");
        }

        let histogram = HistogramVec::new(
            options.naming.histogram_opts(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
                &options.buckets,
            ),
            &labels,
        )?;
        registry.register(Box::new(histogram.clone()))?;

        Ok(Box::new(Latency {
            histogram,
            include_handler: options.should_include_handler,
            include_method: options.should_include_method,
            include_status: options.should_include_status,
        }) as BoxedUpdater)
    }
}

// --- Request counter ------------------------------------------------------

/// Configuration for the [`requests`] updater.
#[derive(Debug, Clone, Default)]
pub struct RequestsOptions {
    pub naming: MetricNaming,
}

struct Requests {
    total: CounterVec,
}

impl MetricUpdater for Requests {
    fn update(&self, info: &Info) -> Result<(), Error> {
        self.total
            .with_label_values(&[&info.handler, info.method.as_str(), &info.status_label])
            .inc();
        Ok(())
    }
}

/// Total request counter labeled by `handler`, `method` and `status`.
pub fn requests(
    options: RequestsOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    move |registry| {
        let total = register_counter_vec_with_registry!(
            options
                .naming
                .opts("http_requests_total", "Total number of HTTP requests"),
            &["handler", "method", "status"],
            registry.clone()
        )?;

        Ok(Box::new(Requests { total }) as BoxedUpdater)
    }
}

// --- Payload sizes --------------------------------------------------------

/// Configuration for the size updaters.
#[derive(Debug, Clone)]
pub struct SizeOptions {
    pub naming: MetricNaming,
    pub buckets: Vec<f64>,
}

impl Default for SizeOptions {
    fn default() -> Self {
        SizeOptions {
            naming: MetricNaming::default(),
            buckets: SIZE_BUCKETS.to_vec(),
        }
    }
}

enum SizeSource {
    Request,
    Response,
    Combined,
}

struct PayloadSize {
    histogram: HistogramVec,
    source: SizeSource,
}

impl MetricUpdater for PayloadSize {
    fn update(&self, info: &Info) -> Result<(), Error> {
        // Unknown sizes are skipped entirely; recording zero would skew the sum.
        let observed = match self.source {
            SizeSource::Request => info.request_size,
            SizeSource::Response => info.response_size,
            SizeSource::Combined => match (info.request_size, info.response_size) {
                (None, None) => None,
                (request, response) => Some(request.unwrap_or(0) + response.unwrap_or(0)),
            },
        };
        if let Some(bytes) = observed {
            self.histogram
                .with_label_values(&[&info.handler])
                .observe(bytes as f64);
        }
        Ok(())
    }
}

fn size_factory(
    options: SizeOptions,
    default_name: &'static str,
    help: &'static str,
    source: SizeSource,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    move |registry| {
        let histogram = register_histogram_vec_with_registry!(
            options.naming.histogram_opts(default_name, help, &options.buckets),
            &["handler"],
            registry.clone()
        )?;

        Ok(Box::new(PayloadSize { histogram, source }) as BoxedUpdater)
    }
}

/// Request body size distribution per handler, from `Content-Length`.
pub fn request_size(
    options: SizeOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    size_factory(
        options,
        "http_request_size_bytes",
        "Content length of incoming requests in bytes",
        SizeSource::Request,
    )
}

/// Response body size distribution per handler, from `Content-Length`.
pub fn response_size(
    options: SizeOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    size_factory(
        options,
        "http_response_size_bytes",
        "Content length of outgoing responses in bytes",
        SizeSource::Response,
    )
}

/// Combined request + response byte distribution per handler. The sum of
/// the known sides is observed; the observation is skipped only when both
/// sides are unknown.
pub fn combined_size(
    options: SizeOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    size_factory(
        options,
        "http_combined_size_bytes",
        "Combined content length of requests and responses in bytes",
        SizeSource::Combined,
    )
}

// --- Accept-Language counter ----------------------------------------------

/// Configuration for the [`requests_by_language`] updater.
#[derive(Debug, Clone, Default)]
pub struct LanguageOptions {
    pub naming: MetricNaming,
}

struct RequestsByLanguage {
    total: CounterVec,
}

impl MetricUpdater for RequestsByLanguage {
    fn update(&self, info: &Info) -> Result<(), Error> {
        self.total
            .with_label_values(&[&primary_language(&info.request_headers)])
            .inc();
        Ok(())
    }
}

/// Request counter keyed by the primary `Accept-Language` tag.
///
/// Demonstrates deriving labels from request headers; requests without a
/// parseable header count under `"unknown"`.
pub fn requests_by_language(
    options: LanguageOptions,
) -> impl FnOnce(&Registry) -> Result<BoxedUpdater, Error> {
    move |registry| {
        let total = register_counter_vec_with_registry!(
            options.naming.opts(
                "http_requests_by_language_total",
                "Total requests by primary Accept-Language tag"
            ),
            &["language"],
            registry.clone()
        )?;

        Ok(Box::new(RequestsByLanguage { total }) as BoxedUpdater)
    }
}

/// First language tag of the `Accept-Language` header, quality weights
/// stripped.
fn primary_language(headers: &HeaderMap) -> String {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim().to_string())
        .filter(|tag| !tag.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn primary_language_strips_quality_weights() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-DE;q=0.9, en;q=0.8"),
        );
        assert_eq!(primary_language(&headers), "de-DE");
    }

    #[test]
    fn primary_language_defaults_to_unknown() {
        assert_eq!(primary_language(&HeaderMap::new()), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(""));
        assert_eq!(primary_language(&headers), "unknown");
    }
}

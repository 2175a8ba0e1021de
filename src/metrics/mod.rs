//! Metric updaters: the capability every pluggable metric implements,
//! plus the shipped factories.

mod updaters;

pub use updaters::{
    combined_size, default, latency, request_size, requests, requests_by_language, response_size,
    BoxedUpdater, DefaultOptions, LanguageOptions, LatencyOptions, MetricNaming, MetricUpdater,
    RequestsOptions, SizeOptions, LATENCY_HIGHR_BUCKETS, LATENCY_LOWR_BUCKETS, SIZE_BUCKETS,
};

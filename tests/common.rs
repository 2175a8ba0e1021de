//! Shared helpers for the integration tests: a small test API with
//! predictable statuses and payloads, plus registry inspection utilities.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::Router;
use prometheus::Registry;
use promotron::{Instrumentator, Options};
use tower::ServiceExt;

/// Routes used across the integration tests.
pub fn test_router() -> Router {
    Router::new()
        .route("/items/:id", get(|| async { "item" }))
        .route(
            "/items",
            post(|| async { (StatusCode::CREATED, "created") }),
        )
        .route("/users", get(|| async { "users" }))
        .route("/admin/users", get(|| async { "admin users" }))
        .route(
            "/redirect",
            get(|| async { Redirect::temporary("/items/1") }),
        )
        .route(
            "/invalid-length",
            get(|| async {
                ([(header::CONTENT_LENGTH, "abc")], "body").into_response()
            }),
        )
        .route(
            "/sized",
            get(|| async { ([(header::CONTENT_LENGTH, "4")], "body").into_response() }),
        )
}

/// Builds the test app with the given options and the default metric set
/// (nothing registered, so the instrumentator injects its default).
pub fn instrumented_app(options: Options) -> (Router, Instrumentator) {
    let mut instrumentator = Instrumentator::new(options).expect("options are valid");
    let app = instrumentator.instrument(test_router());
    (app, instrumentator)
}

/// Sends a GET request through the app via `oneshot`.
pub async fn send_get(app: &Router, path: &str) -> axum::response::Response {
    send(app, Method::GET, path, Body::empty()).await
}

pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Body,
) -> axum::response::Response {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(body)
        .expect("failed to build request");
    app.clone().oneshot(request).await.expect("infallible")
}

/// Value of a counter child with the given labels, 0.0 when absent.
pub fn counter_value(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_metric(registry, name, labels)
        .map(|metric| metric.get_counter().get_value())
        .unwrap_or(0.0)
}

/// Sample count of a histogram child with the given labels, 0 when absent.
pub fn histogram_count(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> u64 {
    find_metric(registry, name, labels)
        .map(|metric| metric.get_histogram().get_sample_count())
        .unwrap_or(0)
}

/// Sample sum of a histogram child with the given labels, 0.0 when absent.
pub fn histogram_sum(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_metric(registry, name, labels)
        .map(|metric| metric.get_histogram().get_sample_sum())
        .unwrap_or(0.0)
}

/// Total sample count across every child of a histogram family.
pub fn histogram_total_count(registry: &Registry, name: &str) -> u64 {
    registry
        .gather()
        .iter()
        .filter(|family| family.get_name() == name)
        .flat_map(|family| family.get_metric())
        .map(|metric| metric.get_histogram().get_sample_count())
        .sum()
}

fn find_metric(
    registry: &Registry,
    name: &str,
    labels: &[(&str, &str)],
) -> Option<prometheus::proto::Metric> {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == name)?
        .get_metric()
        .iter()
        .find(|metric| {
            labels.iter().all(|(key, value)| {
                metric
                    .get_label()
                    .iter()
                    .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
            })
        })
        .cloned()
}

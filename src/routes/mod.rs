//! HTTP route definitions for the demo service.
//!
//! The binary exists to show the instrumentation pipeline against real
//! routes: a health check plus a small templated API surface.

mod demo_routes;
mod health_routes;

use axum::Router;

/// Creates the demo application router.
///
/// Instrumentation is attached separately by the caller (see
/// [`startup::run`](crate::startup::run)), so this router stays usable in
/// tests without any middleware.
pub fn create_router() -> Router {
    Router::new()
        .merge(demo_routes::routes())
        .merge(health_routes::routes())
}

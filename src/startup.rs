//! Application startup and server initialization.
//!
//! Builds the demo router, wires the instrumentation middleware and the
//! exposition endpoint into it, and serves the result.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::instrument::Instrumentator;
use crate::routes;

/// Initializes and runs the application server.
///
/// Attaches instrumentation before registering the exposition endpoint so
/// scrapes of the metrics path do not show up in the metrics themselves.
///
/// # Errors
///
/// Returns an error if instrumentation construction fails (e.g. an invalid
/// exclusion pattern) or the server encounters a runtime error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let mut instrumentator = Instrumentator::new(config.instrumentation.clone())?;

    let app = routes::create_router();
    let app = instrumentator.instrument(app);
    let app = instrumentator.expose(app, &config.metrics_path);

    info!("Starting server on {}", config.bind_address);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .expect("Could not bind to specified address");

    axum::serve(listener, app).await?;

    Ok(())
}

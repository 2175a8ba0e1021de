//! Sample API routes exercising the instrumentation labels.

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

/// Registers the demo API routes.
pub fn routes() -> Router {
    Router::new()
        .route("/items", post(create_item))
        .route("/items/:id", get(get_item))
}

/// Returns a single item. The metric label records the template
/// `/items/:id`, never the concrete id, keeping cardinality bounded.
async fn get_item(Path(id): Path<String>) -> impl IntoResponse {
    (StatusCode::OK, format!("item {}", id))
}

/// Creates an item; responds 201 so grouped metrics show a `2xx` label.
async fn create_item(body: String) -> impl IntoResponse {
    (StatusCode::CREATED, body)
}

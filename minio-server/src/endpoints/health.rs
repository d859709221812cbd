use axum::response::IntoResponse;
use axum::{Router, routing};

/// Liveness route shared by the object API and the management API.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", routing::get(health))
}

async fn health() -> impl IntoResponse {
    "OK"
}

use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that sit outside `/admin`. The reader-facing site is served
/// elsewhere; this service only exposes its health probe here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
}

pub mod facets;
pub mod health;
pub mod invocations;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health probes
        .route("/ping", get(health::ping))
        .route("/status", get(health::status))
        // Agent traffic
        .route("/invocations", post(invocations::invoke))
}

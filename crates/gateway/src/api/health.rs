//! Health and status probes. Neither touches the admission gate.

use axum::extract::State;
use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Eventually-consistent view of the cached runtime and streaming state.
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let runtime = state.runtimes.current().map(|cached| {
        json!({
            "tools": cached.tool_names,
            "context_loaded": !cached.facets.context_is_empty(),
            "diagram": cached.facets.artifact_reference,
            "diagram_loaded": cached.artifact.is_some(),
            "budget_level": cached.facets.reasoning_tier.level(),
            "thinking_enabled": cached.facets.reasoning_tier.is_enabled(),
            "built_at": cached.built_at.to_rfc3339(),
        })
    });

    Json(json!({
        "status": "healthy",
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "runtime": runtime,
        "runtime_builds": state.runtimes.build_count(),
        "cached_artifacts": state.runtimes.artifacts().len(),
        "busy": state.gate.is_busy(),
        "active_streams": state.cancels.len(),
        "idle_bridge_workers": state.bridge.idle_workers(),
    }))
}

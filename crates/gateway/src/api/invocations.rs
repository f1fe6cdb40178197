//! `POST /invocations`: the single entry point for agent traffic.
//!
//! Dispatches on `input.type`:
//! - `ping`, `tools`, `history`, `prepare`, `cancel` are light requests and
//!   answer with JSON
//! - `resume_interrupt` and anything else run the agent and answer with an
//!   SSE stream of data-only frames

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use ts_domain::runtime::RunInput;
use ts_tools::friendly_name;

use super::facets;
use crate::runtime::{run_turn, TurnInput};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub input: Map<String, Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `{ "error": { "code": ..., "detail": ... } }` with the given status.
fn api_error(status: StatusCode, code: &str, detail: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "detail": detail.into() } })),
    )
        .into_response()
}

fn session_token(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let name = &state.config.server.session_header;
    headers
        .get(name.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "missing_header",
                format!("Missing required header: {name}"),
            )
        })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /invocations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn invoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<InvocationRequest>, JsonRejection>,
) -> Response {
    let session = match session_token(&state, &headers) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Json(InvocationRequest { input }) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return api_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                rejection.body_text(),
            )
        }
    };

    let kind = input.get("type").and_then(Value::as_str).unwrap_or_default();
    tracing::debug!(session = %session, kind, "invocation");

    match kind {
        "ping" => Json(json!({ "type": "pong", "message": "pong" })).into_response(),
        "tools" => list_tools(&state),
        "history" => history(&state, &session),
        "prepare" => prepare(&state, &input).await,
        "cancel" => cancel(&state, &session),
        "resume_interrupt" => match facets::resume_outcome(&input) {
            Ok(outcome) => stream(state, session, RunInput::Resume(outcome), &input),
            Err(detail) => api_error(StatusCode::BAD_REQUEST, "invalid_request", detail),
        },
        _ => {
            let text = facets::prompt_text(&input);
            stream(state, session, RunInput::Prompt { text }, &input)
        }
    }
}

// ── Light requests ──────────────────────────────────────────────────

fn list_tools(state: &AppState) -> Response {
    let tools: Vec<Value> = state
        .runtimes
        .registry()
        .names()
        .into_iter()
        .map(|id| json!({ "id": id, "tool_name": friendly_name(id) }))
        .collect();
    Json(json!({ "available_tools": tools })).into_response()
}

fn history(state: &AppState, session: &str) -> Response {
    let snapshots = state
        .runtimes
        .current()
        .map(|cached| {
            cached
                .runtime
                .history(session, state.config.agent.history_depth)
        })
        .unwrap_or_default();
    let history = if snapshots.is_empty() {
        Value::Null
    } else {
        json!(snapshots)
    };
    Json(json!({ "history": history })).into_response()
}

/// Warm the runtime cache for the requested facets. Does not take the
/// admission gate.
async fn prepare(state: &AppState, input: &Map<String, Value>) -> Response {
    let requested = facets::extract_facets(input, state.current_tier());
    match state.runtimes.resolve(&requested).await {
        Ok(cached) => Json(json!({
            "type": "prepare_complete",
            "active_tools": cached.tool_names,
            "context_loaded": !cached.facets.context_is_empty(),
            "diagram_loaded": cached.artifact.is_some(),
            "budget_level": cached.facets.reasoning_tier.level(),
            "thinking_enabled": cached.facets.reasoning_tier.is_enabled(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "prepare failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "type": "prepare_error", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn cancel(state: &AppState, session: &str) -> Response {
    let response = if state.cancels.cancel(session) {
        tracing::info!(session = %session, "stream cancellation requested");
        "stream_cancelled"
    } else {
        "no_active_stream"
    };
    Json(json!({ "response": response })).into_response()
}

// ── Heavy requests ──────────────────────────────────────────────────

fn stream(
    state: AppState,
    session: String,
    input: RunInput,
    raw: &Map<String, Value>,
) -> Response {
    let requested = facets::has_facets(raw).then(|| {
        let base = state
            .runtimes
            .current()
            .map(|cached| cached.facets.clone())
            .unwrap_or_else(|| state.default_facets());
        facets::overlay_facets(raw, &base)
    });

    let turn = TurnInput {
        session,
        input,
        facets: requested,
    };
    match run_turn(state, turn) {
        Ok(events) => {
            let frames = events.map(|event| {
                Ok::<_, Infallible>(Event::default().data(event.to_json().to_string()))
            });
            Sse::new(frames)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(busy) => api_error(StatusCode::TOO_MANY_REQUESTS, "busy", busy.to_string()),
    }
}

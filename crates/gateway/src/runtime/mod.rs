//! Session-runtime core: facet fingerprints, the artifact and runtime
//! caches, admission control, and the bridge that turns a blocking run
//! into a stream of client events.
//!
//! Entry point: [`run_turn`] admits one heavy request, resolves the
//! runtime, and returns a stream of [`ClientEvent`]s for SSE framing.

pub mod artifacts;
pub mod bridge;
pub mod cache;
pub mod cancel;
pub mod classify;
pub mod fingerprint;
pub mod gate;
pub mod prompt;

use futures_util::StreamExt;

use ts_domain::event::ClientEvent;
use ts_domain::facets::Facets;
use ts_domain::runtime::{RunInput, RunOptions};
use ts_domain::stream::BoxStream;

use crate::state::AppState;
use bridge::BridgeRequest;
use gate::Busy;

/// One heavy request.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub session: String,
    pub input: RunInput,
    /// Facets carried by the request. `None` reuses whatever runtime is
    /// cached, building the default one if the slot is empty.
    pub facets: Option<Facets>,
}

/// Admit and start a turn.
///
/// Rejects immediately with [`Busy`] when another turn holds the gate. A
/// later failure (runtime build, producer error) is reported in-stream as a
/// single error event, which is then the last event. Otherwise the stream
/// closes with an end event.
pub fn run_turn(state: AppState, turn: TurnInput) -> Result<BoxStream<'static, ClientEvent>, Busy> {
    let permit = state.gate.try_enter()?;

    Ok(Box::pin(async_stream::stream! {
        let TurnInput { session, input, facets } = turn;

        let resolved = match &facets {
            Some(facets) => state.runtimes.resolve(facets).await,
            None => state.runtimes.current_or_build(&state.default_facets()).await,
        };
        let cached = match resolved {
            Ok(cached) => cached,
            Err(e) => {
                tracing::error!(session = %session, error = %e, "could not prepare runtime for turn");
                yield ClientEvent::Error { message: e.to_string() };
                return;
            }
        };

        tracing::info!(
            session = %session,
            resume = matches!(input, RunInput::Resume(_)),
            tools = ?cached.tool_names,
            tier = %cached.facets.reasoning_tier,
            artifact = cached.artifact.is_some(),
            "turn started"
        );

        let registration = state.cancels.register(&session);
        let request = BridgeRequest {
            runtime: cached.runtime.clone(),
            session: session.clone(),
            input,
            options: RunOptions {
                artifact: cached.artifact.clone(),
                recursion_limit: state.config.agent.recursion_limit,
            },
            cancel: registration.token().clone(),
        };
        let mut raw = state.bridge.open(request, (permit, registration));

        let mut ended = false;
        let mut emitted = 0usize;
        while let Some(item) = raw.next().await {
            match item {
                Ok(event) => {
                    if let Some(client_event) = classify::classify(&event) {
                        ended = client_event == ClientEvent::End;
                        emitted += 1;
                        yield client_event;
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %session, error = %e, emitted, "turn failed");
                    yield ClientEvent::Error { message: e.to_string() };
                    return;
                }
            }
        }
        if !ended {
            yield ClientEvent::End;
        }
        tracing::info!(session = %session, emitted, "turn finished");
    }))
}

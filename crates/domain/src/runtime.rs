//! The seams between the gateway core and whatever executes a conversation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::artifact::Artifact;
use crate::error::Result;
use crate::event::RawEvent;
use crate::facets::ReasoningTier;
use crate::message::Message;
use crate::tool::{ResumeOutcome, Tool};

/// Blocking, pull-based event sequence of one run.
///
/// Each `next()` may block on network or tool work. Dropping the iterator
/// before it is exhausted abandons the run at that point.
pub type EventIter = Box<dyn Iterator<Item = Result<RawEvent>>>;

/// What the caller wants the runtime to do with the session.
#[derive(Debug, Clone, PartialEq)]
pub enum RunInput {
    /// A new user turn.
    Prompt { text: String },
    /// Answer to the interrupt the session is paused on.
    Resume(ResumeOutcome),
}

/// Per-invocation settings that do not affect runtime identity.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Visual context attached to the user turn.
    pub artifact: Option<Arc<Artifact>>,
    /// Hard ceiling on internal steps for this run.
    pub recursion_limit: usize,
}

/// A point-in-time copy of a session's checkpointed state.
#[derive(Debug, Clone, Serialize)]
pub struct HistorySnapshot {
    pub step: usize,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    /// Interrupt payload the session is currently paused on, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_interrupt: Option<Value>,
}

/// A constructed, stateful, reusable execution object.
///
/// Conversation state lives inside the runtime, addressed by session token.
pub trait Runtime: Send + Sync {
    /// Start a run and return its event sequence. Called from a blocking
    /// worker; implementations may block.
    fn stream(&self, session: &str, input: RunInput, options: RunOptions) -> Result<EventIter>;

    /// Up to `depth` most recent snapshots of `session`, newest first.
    fn history(&self, session: &str, depth: usize) -> Vec<HistorySnapshot>;
}

/// Everything a runtime is built from.
#[derive(Clone)]
pub struct RuntimeSpec {
    pub tools: Vec<Arc<dyn Tool>>,
    pub system_prompt: String,
    pub reasoning_tier: ReasoningTier,
}

impl std::fmt::Debug for RuntimeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSpec")
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("system_prompt_chars", &self.system_prompt.len())
            .field("reasoning_tier", &self.reasoning_tier)
            .finish()
    }
}

/// Constructs runtimes. Builds are expensive; callers cache the result.
#[async_trait::async_trait]
pub trait RuntimeBuilder: Send + Sync {
    async fn build(&self, spec: RuntimeSpec) -> Result<Arc<dyn Runtime>>;
}

use serde::{Deserialize, Serialize};
use ts_domain::error::Result;
use ts_domain::event::StopReason;
use ts_domain::message::Message;
use ts_domain::tool::ToolDefinition;

use crate::settings::ModelSettings;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / stream types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic streaming model request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub settings: ModelSettings,
    pub system: String,
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
}

/// Token usage reported at the end of a model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One incremental piece of a streamed model response.
///
/// `index` identifies the content block a delta belongs to; blocks open
/// with a `*Start`/first delta and close with [`ModelDelta::BlockStop`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text { index: usize, text: String },
    Thinking { index: usize, text: String },
    ThinkingSignature { index: usize, signature: String },
    ToolUseStart { index: usize, id: String, name: String },
    ToolInput { index: usize, partial_json: String },
    BlockStop { index: usize },
    /// Always the final delta of a successful call.
    MessageStop {
        stop_reason: Option<StopReason>,
        usage: Option<Usage>,
    },
}

/// Blocking delta iterator for one model call.
pub type ModelStream = Box<dyn Iterator<Item = Result<ModelDelta>> + Send>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core model trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every model adapter implements.
pub trait ChatModel: Send + Sync {
    /// Start a streamed call. Blocks until response headers arrive.
    fn stream(&self, req: &ModelRequest) -> Result<ModelStream>;

    /// A unique identifier for this client instance (used in logs/errors).
    fn provider_id(&self) -> &str;
}

//! Event vocabularies on both sides of the classifier.
//!
//! [`RawEvent`] is what a runtime emits while it executes a turn: control
//! traffic from the agent graph and incremental message output.
//! [`ClientEvent`] is the small, closed set the transport layer frames and
//! sends to callers.

use serde::ser::{Serialize, Serializer};
use serde_json::{json, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Raw runtime events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One item of a runtime's native event sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Control(ControlSignal),
    Message(MessageChunk),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// A tool paused the run awaiting external confirmation.
    Interrupt { value: Value },
    /// A graph node finished a step and committed its output.
    StepCompleted { node: String, step: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageChunk {
    Assistant(AssistantChunk),
    ToolResult(ToolResultChunk),
}

/// Incremental output of a model call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantChunk {
    pub content: Vec<ContentItem>,
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text { text: String },
    Reasoning { text: String },
    /// Start of (or argument fragment for) a tool invocation. The start
    /// fragment carries `id` and `name`; argument fragments carry neither.
    ToolUse {
        id: Option<String>,
        name: Option<String>,
        input: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other(String),
}

impl StopReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            other => StopReason::Other(other.to_owned()),
        }
    }
}

/// The committed result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultChunk {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error,
}

// Convenience constructors used by runtimes and tests.
impl RawEvent {
    pub fn text(text: impl Into<String>) -> Self {
        RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
            content: vec![ContentItem::Text { text: text.into() }],
            stop_reason: None,
        }))
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
            content: vec![ContentItem::Reasoning { text: text.into() }],
            stop_reason: None,
        }))
    }

    pub fn stop(reason: StopReason) -> Self {
        RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
            content: Vec::new(),
            stop_reason: Some(reason),
        }))
    }

    pub fn interrupt(value: Value) -> Self {
        RawEvent::Control(ControlSignal::Interrupt { value })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events delivered to callers, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Text { content: String },
    Thinking { content: String },
    ToolStart { tool_name: String },
    ToolResult {
        tool_name: String,
        /// Parsed JSON when the tool output was JSON, the raw string otherwise.
        content: Value,
        error: bool,
    },
    Interrupt { content: Value },
    /// The model finished its turn. The stream stays open until the
    /// producer itself completes.
    End,
    Error { message: String },
}

impl ClientEvent {
    /// Wire representation sent to the caller.
    pub fn to_json(&self) -> Value {
        match self {
            ClientEvent::Text { content } => json!({ "type": "text", "content": content }),
            ClientEvent::Thinking { content } => {
                json!({ "type": "thinking", "content": content })
            }
            ClientEvent::ToolStart { tool_name } => json!({
                "type": "tool",
                "tool_name": tool_name,
                "tool_start": true,
            }),
            ClientEvent::ToolResult {
                tool_name,
                content,
                error,
            } => json!({
                "type": "tool",
                "tool_name": tool_name,
                "tool_start": false,
                "content": content,
                "error": error,
            }),
            ClientEvent::Interrupt { content } => {
                json!({ "type": "interrupt", "content": content })
            }
            ClientEvent::End => json!({ "end": true }),
            ClientEvent::Error { message } => json!({ "error": message }),
        }
    }
}

impl Serialize for ClientEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

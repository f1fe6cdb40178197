use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool call assembled from a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Tool definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

/// Structured outcome supplied by the caller when resuming a paused tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeOutcome {
    /// Which action the caller confirmed (normally the paused tool's name).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResumeOutcome {
    pub fn accepted(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            error: None,
        }
    }

    pub fn rejected(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// What a single tool invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Finished; the value becomes the tool-result message content.
    Complete(Value),
    /// Suspend the run until the caller confirms; the value is surfaced
    /// to the client as the interrupt payload.
    Interrupt(Value),
    /// Finished with an error; the result message carries error status.
    Failed(String),
}

/// Arguments handed to [`Tool::invoke`].
///
/// `resume` is `Some` only when the same call is being re-entered after
/// the caller answered an earlier [`ToolOutcome::Interrupt`].
#[derive(Debug, Clone, Copy)]
pub struct ToolInvocation<'a> {
    pub call_id: &'a str,
    pub arguments: &'a Value,
    pub resume: Option<&'a ResumeOutcome>,
}

/// A callable tool. Invocation is synchronous; it runs on the runtime's
/// blocking worker, never on the async executor.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn parameters(&self) -> Value;

    fn invoke(&self, call: ToolInvocation<'_>) -> ToolOutcome;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameters(),
        }
    }
}

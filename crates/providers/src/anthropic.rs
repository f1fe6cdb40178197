//! Anthropic-native adapter.
//!
//! Implements the streaming Messages API including tool use, extended
//! thinking, and base64 image blocks. The system prompt goes in the
//! separate top-level `system` field.

use std::collections::VecDeque;
use std::io::BufReader;
use std::time::Duration;

use serde_json::{json, Value};
use ts_domain::config::LlmConfig;
use ts_domain::error::{Error, Result};
use ts_domain::event::StopReason;
use ts_domain::message::{ContentBlock, Message, Role};
use ts_domain::tool::ToolDefinition;

use crate::settings::INTERLEAVED_THINKING_BETA;
use crate::sse::SseDataReader;
use crate::traits::{ChatModel, ModelDelta, ModelRequest, ModelStream, Usage};
use crate::util::{from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A blocking client for the Anthropic Messages API.
pub struct AnthropicModel {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl AnthropicModel {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: format!("anthropic/{}", cfg.model),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authed_post(&self, url: &str, req: &ModelRequest) -> reqwest::blocking::RequestBuilder {
        let mut builder = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if req.settings.thinking.is_some_and(|t| t.interleaved) {
            builder = builder.header("anthropic-beta", INTERLEAVED_THINKING_BETA);
        }
        builder
    }
}

/// Request body for a streamed Messages call.
pub(crate) fn build_messages_body(req: &ModelRequest) -> Value {
    let messages: Vec<Value> = req.messages.iter().map(message_to_anthropic).collect();

    let mut body = json!({
        "model": req.settings.model,
        "max_tokens": req.settings.max_tokens,
        "messages": messages,
        "stream": true,
    });

    if !req.system.is_empty() {
        body["system"] = Value::String(req.system.clone());
    }

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
        body["tools"] = Value::Array(tools);
    }

    if let Some(thinking) = req.settings.thinking {
        body["thinking"] = json!({
            "type": "enabled",
            "budget_tokens": thinking.budget_tokens,
        });
    }

    body
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn message_to_anthropic(msg: &Message) -> Value {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content: Vec<Value> = msg.content.iter().filter_map(block_to_anthropic).collect();
    json!({ "role": role, "content": content })
}

fn block_to_anthropic(block: &ContentBlock) -> Option<Value> {
    match block {
        ContentBlock::Text { text } => Some(json!({ "type": "text", "text": text })),
        // Unsigned thinking (a run cut short mid-block) is rejected on replay.
        ContentBlock::Thinking { thinking, signature } => signature.as_ref().map(|sig| {
            json!({ "type": "thinking", "thinking": thinking, "signature": sig })
        }),
        ContentBlock::ToolUse { id, name, input } => Some(json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        })),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Some(json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        })),
        ContentBlock::Image { media_type, data } => Some(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": media_type,
                "data": data,
            }
        })),
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming SSE helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-call state carried across SSE payloads.
#[derive(Default)]
pub(crate) struct StreamState {
    usage: Option<Usage>,
    stop_reason: Option<StopReason>,
    done_emitted: bool,
}

fn index_of(v: &Value) -> usize {
    v.get("index").and_then(Value::as_u64).unwrap_or(0) as usize
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: v.get("input_tokens")?.as_u64()? as u32,
        output_tokens: v.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
    })
}

/// Parse one SSE data payload into zero or more deltas.
pub(crate) fn parse_anthropic_sse(
    provider: &str,
    data: &str,
    state: &mut StreamState,
) -> Vec<Result<ModelDelta>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    match v.get("type").and_then(Value::as_str).unwrap_or("") {
        "message_start" => {
            state.usage = v
                .get("message")
                .and_then(|m| m.get("usage"))
                .and_then(parse_usage);
        }

        "content_block_start" => {
            let index = index_of(&v);
            if let Some(block) = v.get("content_block") {
                match block.get("type").and_then(Value::as_str).unwrap_or("") {
                    "tool_use" => events.push(Ok(ModelDelta::ToolUseStart {
                        index,
                        id: str_field(block, "id"),
                        name: str_field(block, "name"),
                    })),
                    "text" => {
                        let text = str_field(block, "text");
                        if !text.is_empty() {
                            events.push(Ok(ModelDelta::Text { index, text }));
                        }
                    }
                    _ => {}
                }
            }
        }

        "content_block_delta" => {
            let index = index_of(&v);
            if let Some(delta) = v.get("delta") {
                match delta.get("type").and_then(Value::as_str).unwrap_or("") {
                    "text_delta" => {
                        let text = str_field(delta, "text");
                        if !text.is_empty() {
                            events.push(Ok(ModelDelta::Text { index, text }));
                        }
                    }
                    "thinking_delta" => {
                        let text = str_field(delta, "thinking");
                        if !text.is_empty() {
                            events.push(Ok(ModelDelta::Thinking { index, text }));
                        }
                    }
                    "signature_delta" => events.push(Ok(ModelDelta::ThinkingSignature {
                        index,
                        signature: str_field(delta, "signature"),
                    })),
                    "input_json_delta" => {
                        let partial_json = str_field(delta, "partial_json");
                        if !partial_json.is_empty() {
                            events.push(Ok(ModelDelta::ToolInput {
                                index,
                                partial_json,
                            }));
                        }
                    }
                    _ => {}
                }
            }
        }

        "content_block_stop" => events.push(Ok(ModelDelta::BlockStop { index: index_of(&v) })),

        "message_delta" => {
            if let Some(output) = v
                .get("usage")
                .and_then(|u| u.get("output_tokens"))
                .and_then(Value::as_u64)
            {
                let usage = state.usage.get_or_insert_with(Usage::default);
                usage.output_tokens = output as u32;
            }
            if let Some(reason) = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(Value::as_str)
            {
                state.stop_reason = Some(StopReason::parse(reason));
            }
        }

        "message_stop" => {
            if !state.done_emitted {
                state.done_emitted = true;
                events.push(Ok(ModelDelta::MessageStop {
                    stop_reason: state.stop_reason.take(),
                    usage: state.usage,
                }));
            }
        }

        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            events.push(Err(Error::Provider {
                provider: provider.to_string(),
                message: message.to_string(),
            }));
        }

        _ => {
            // ping or unknown event types -- ignore.
        }
    }

    events
}

/// Pull-based delta iterator over a live response body.
struct AnthropicStream<R> {
    provider: String,
    lines: SseDataReader<R>,
    state: StreamState,
    pending: VecDeque<Result<ModelDelta>>,
    finished: bool,
}

impl<R: std::io::BufRead> Iterator for AnthropicStream<R> {
    type Item = Result<ModelDelta>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(Ok(data)) => {
                    let parsed = parse_anthropic_sse(&self.provider, &data, &mut self.state);
                    self.pending.extend(parsed);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if !self.state.done_emitted {
                        self.state.done_emitted = true;
                        tracing::warn!(provider = %self.provider, "stream closed without message_stop");
                        return Some(Ok(ModelDelta::MessageStop {
                            stop_reason: self.state.stop_reason.take(),
                            usage: self.state.usage,
                        }));
                    }
                    return None;
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl ChatModel for AnthropicModel {
    fn stream(&self, req: &ModelRequest) -> Result<ModelStream> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = build_messages_body(req);

        tracing::debug!(
            provider = %self.id,
            url = %url,
            messages = req.messages.len(),
            tools = req.tools.len(),
            thinking = req.settings.thinking.is_some(),
            "anthropic stream request"
        );

        let resp = self
            .authed_post(&url, req)
            .json(&body)
            .send()
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(Box::new(AnthropicStream {
            provider: self.id.clone(),
            lines: SseDataReader::new(BufReader::new(resp)),
            state: StreamState::default(),
            pending: VecDeque::new(),
            finished: false,
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

//! Assembly of one streamed model response into an assistant message.

use std::collections::BTreeMap;

use serde_json::Value;
use ts_domain::event::{AssistantChunk, ContentItem, MessageChunk, RawEvent};
use ts_domain::message::{ContentBlock, Message};
use ts_domain::tool::ToolCall;
use ts_providers::ModelDelta;

#[derive(Debug)]
enum BlockBuf {
    Text(String),
    Thinking {
        text: String,
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        json: String,
    },
}

/// Content blocks of the response in flight, keyed by block index.
#[derive(Debug, Default)]
pub(crate) struct TurnBuffer {
    blocks: BTreeMap<usize, BlockBuf>,
}

fn chunk(item: ContentItem) -> RawEvent {
    RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
        content: vec![item],
        stop_reason: None,
    }))
}

impl TurnBuffer {
    /// Fold a delta into the buffer, returning the raw event it maps to.
    /// `MessageStop` is handled by the caller.
    pub(crate) fn apply(&mut self, delta: ModelDelta) -> Option<RawEvent> {
        match delta {
            ModelDelta::Text { index, text } => {
                match self
                    .blocks
                    .entry(index)
                    .or_insert_with(|| BlockBuf::Text(String::new()))
                {
                    BlockBuf::Text(buf) => buf.push_str(&text),
                    other => tracing::warn!(index, block = ?other, "text delta for non-text block"),
                }
                Some(chunk(ContentItem::Text { text }))
            }
            ModelDelta::Thinking { index, text } => {
                if let BlockBuf::Thinking { text: buf, .. } =
                    self.blocks.entry(index).or_insert_with(|| BlockBuf::Thinking {
                        text: String::new(),
                        signature: None,
                    })
                {
                    buf.push_str(&text);
                }
                Some(chunk(ContentItem::Reasoning { text }))
            }
            ModelDelta::ThinkingSignature { index, signature } => {
                if let Some(BlockBuf::Thinking { signature: sig, .. }) = self.blocks.get_mut(&index)
                {
                    *sig = Some(signature);
                }
                None
            }
            ModelDelta::ToolUseStart { index, id, name } => {
                self.blocks.insert(
                    index,
                    BlockBuf::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        json: String::new(),
                    },
                );
                Some(chunk(ContentItem::ToolUse {
                    id: Some(id),
                    name: Some(name),
                    input: String::new(),
                }))
            }
            ModelDelta::ToolInput {
                index,
                partial_json,
            } => {
                if let Some(BlockBuf::ToolUse { json, .. }) = self.blocks.get_mut(&index) {
                    json.push_str(&partial_json);
                }
                Some(chunk(ContentItem::ToolUse {
                    id: None,
                    name: None,
                    input: partial_json,
                }))
            }
            ModelDelta::BlockStop { .. } | ModelDelta::MessageStop { .. } => None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The assistant message built so far plus the tool calls it makes.
    ///
    /// With `complete == false` (a response cut short) unsigned thinking
    /// is dropped since it cannot be replayed.
    pub(crate) fn finish(self, complete: bool) -> (Option<Message>, Vec<ToolCall>) {
        let mut content = Vec::new();
        let mut calls = Vec::new();

        for (_, block) in self.blocks {
            match block {
                BlockBuf::Text(text) => {
                    if !text.is_empty() {
                        content.push(ContentBlock::Text { text });
                    }
                }
                BlockBuf::Thinking { text, signature } => {
                    if complete || signature.is_some() {
                        content.push(ContentBlock::Thinking {
                            thinking: text,
                            signature,
                        });
                    }
                }
                BlockBuf::ToolUse { id, name, json } => {
                    let input = parse_arguments(&id, &name, &json);
                    calls.push(ToolCall {
                        call_id: id.clone(),
                        tool_name: name.clone(),
                        arguments: input.clone(),
                    });
                    content.push(ContentBlock::ToolUse { id, name, input });
                }
            }
        }

        let message = (!content.is_empty()).then(|| Message::assistant(content));
        (message, calls)
    }
}

fn parse_arguments(call_id: &str, tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                call_id = %call_id,
                tool = %tool,
                error = %e,
                "tool call arguments are not valid JSON; defaulting to empty object"
            );
            Value::Object(Default::default())
        }
    }
}

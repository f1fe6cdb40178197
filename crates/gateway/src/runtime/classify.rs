//! Raw runtime events → client events.

use serde_json::Value;

use ts_domain::event::{
    AssistantChunk, ClientEvent, ContentItem, ControlSignal, MessageChunk, RawEvent, StopReason,
    ToolResultChunk, ToolStatus,
};

/// Map one raw event to the client event it stands for, or `None` when it
/// carries nothing a client should see.
pub fn classify(event: &RawEvent) -> Option<ClientEvent> {
    match event {
        RawEvent::Control(ControlSignal::Interrupt { value }) => Some(ClientEvent::Interrupt {
            content: value.clone(),
        }),
        RawEvent::Control(ControlSignal::StepCompleted { .. }) => None,
        RawEvent::Message(MessageChunk::Assistant(chunk)) => classify_assistant(chunk),
        RawEvent::Message(MessageChunk::ToolResult(result)) => classify_tool_result(result),
    }
}

fn classify_assistant(chunk: &AssistantChunk) -> Option<ClientEvent> {
    if chunk.stop_reason == Some(StopReason::EndTurn) {
        return Some(ClientEvent::End);
    }
    // Only the leading item of a chunk is surfaced.
    match chunk.content.first()? {
        ContentItem::ToolUse {
            name: Some(name), ..
        } => Some(ClientEvent::ToolStart {
            tool_name: name.clone(),
        }),
        ContentItem::ToolUse { name: None, .. } => None,
        ContentItem::Text { text } => Some(ClientEvent::Text {
            content: text.clone(),
        }),
        ContentItem::Reasoning { text } => Some(ClientEvent::Thinking {
            content: text.clone(),
        }),
    }
}

fn classify_tool_result(result: &ToolResultChunk) -> Option<ClientEvent> {
    if result.content.is_empty() {
        return None;
    }
    let content = serde_json::from_str(&result.content)
        .unwrap_or_else(|_| Value::String(result.content.clone()));
    Some(ClientEvent::ToolResult {
        tool_name: result.tool_name.clone(),
        content,
        error: result.status == ToolStatus::Error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_result(content: &str, status: ToolStatus) -> RawEvent {
        RawEvent::Message(MessageChunk::ToolResult(ToolResultChunk {
            tool_call_id: "tu_1".into(),
            tool_name: "add_threats".into(),
            content: content.into(),
            status,
        }))
    }

    #[test]
    fn text_item_becomes_text_event() {
        let ev = classify(&RawEvent::text("hi")).unwrap();
        assert_eq!(ev.to_json(), json!({ "type": "text", "content": "hi" }));
    }

    #[test]
    fn reasoning_item_becomes_thinking_event() {
        let ev = classify(&RawEvent::reasoning("hmm")).unwrap();
        assert_eq!(
            ev,
            ClientEvent::Thinking {
                content: "hmm".into()
            }
        );
    }

    #[test]
    fn end_turn_yields_only_end() {
        let chunk = RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
            content: vec![ContentItem::Text {
                text: "ignored".into(),
            }],
            stop_reason: Some(StopReason::EndTurn),
        }));
        assert_eq!(classify(&chunk), Some(ClientEvent::End));
        assert_eq!(ClientEvent::End.to_json(), json!({ "end": true }));
    }

    #[test]
    fn other_stop_reasons_without_content_are_suppressed() {
        assert_eq!(classify(&RawEvent::stop(StopReason::ToolUse)), None);
        assert_eq!(classify(&RawEvent::stop(StopReason::MaxTokens)), None);
    }

    #[test]
    fn empty_chunk_is_suppressed() {
        let chunk = RawEvent::Message(MessageChunk::Assistant(AssistantChunk::default()));
        assert_eq!(classify(&chunk), None);
        assert_eq!(classify(&tool_result("", ToolStatus::Success)), None);
    }

    #[test]
    fn tool_start_requires_a_name() {
        let start = RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
            content: vec![ContentItem::ToolUse {
                id: Some("tu_1".into()),
                name: Some("edit_threats".into()),
                input: String::new(),
            }],
            stop_reason: None,
        }));
        assert_eq!(
            classify(&start),
            Some(ClientEvent::ToolStart {
                tool_name: "edit_threats".into()
            })
        );

        let fragment = RawEvent::Message(MessageChunk::Assistant(AssistantChunk {
            content: vec![ContentItem::ToolUse {
                id: None,
                name: None,
                input: "{\"threats\"".into(),
            }],
            stop_reason: None,
        }));
        assert_eq!(classify(&fragment), None);
    }

    #[test]
    fn tool_result_parses_json_and_flags_errors() {
        let ok = classify(&tool_result(r#"{"response":"1 threat(s) added"}"#, ToolStatus::Success));
        assert_eq!(
            ok,
            Some(ClientEvent::ToolResult {
                tool_name: "add_threats".into(),
                content: json!({ "response": "1 threat(s) added" }),
                error: false,
            })
        );

        let failed = classify(&tool_result("not json at all", ToolStatus::Error)).unwrap();
        assert_eq!(
            failed,
            ClientEvent::ToolResult {
                tool_name: "add_threats".into(),
                content: Value::String("not json at all".into()),
                error: true,
            }
        );
    }

    #[test]
    fn interrupt_passes_value_through() {
        let value = json!({ "payload": [], "tool_name": "add_threats" });
        let ev = classify(&RawEvent::interrupt(value.clone())).unwrap();
        assert_eq!(ev.to_json(), json!({ "type": "interrupt", "content": value }));
    }

    #[test]
    fn step_completion_is_internal() {
        let ev = RawEvent::Control(ControlSignal::StepCompleted {
            node: "agent".into(),
            step: 1,
        });
        assert_eq!(classify(&ev), None);
    }
}

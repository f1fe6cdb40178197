//! End-to-end runs of the ReAct loop against a scripted model.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use ts_agent::react::CANCELLED_TOOL_RESPONSE;
use ts_agent::AgentBuilder;
use ts_domain::config::LlmConfig;
use ts_domain::error::{Error, Result};
use ts_domain::event::{ControlSignal, MessageChunk, RawEvent, StopReason, ToolStatus};
use ts_domain::facets::ReasoningTier;
use ts_domain::message::{ContentBlock, Role};
use ts_domain::runtime::{Runtime, RunInput, RunOptions, RuntimeBuilder, RuntimeSpec};
use ts_domain::tool::ResumeOutcome;
use ts_providers::{ChatModel, ModelDelta, ModelRequest, ModelStream};
use ts_tools::ToolRegistry;

// ── Scripted model ─────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedModel {
    scripts: Mutex<VecDeque<Vec<Result<ModelDelta>>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn push(&self, deltas: Vec<ModelDelta>) {
        self.scripts
            .lock()
            .push_back(deltas.into_iter().map(Ok).collect());
    }

    fn push_raw(&self, items: Vec<Result<ModelDelta>>) {
        self.scripts.lock().push_back(items);
    }

    fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

impl ChatModel for ScriptedModel {
    fn stream(&self, req: &ModelRequest) -> Result<ModelStream> {
        self.requests.lock().push(req.clone());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("script exhausted".into()))?;
        Ok(Box::new(script.into_iter()))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

fn text_reply(text: &str) -> Vec<ModelDelta> {
    vec![
        ModelDelta::Text {
            index: 0,
            text: text.into(),
        },
        ModelDelta::BlockStop { index: 0 },
        ModelDelta::MessageStop {
            stop_reason: Some(StopReason::EndTurn),
            usage: None,
        },
    ]
}

fn tool_reply(id: &str, tool: &str) -> Vec<ModelDelta> {
    let args = json!({
        "threats": [{
            "name": "Token replay",
            "stride_category": "Spoofing",
            "description": "Replayed bearer tokens impersonate users.",
            "target": "Auth service",
            "impact": "High",
            "likelihood": "Low",
            "mitigations": ["Short token lifetimes", "Bind tokens to clients"]
        }]
    });
    vec![
        ModelDelta::ToolUseStart {
            index: 0,
            id: id.into(),
            name: tool.into(),
        },
        ModelDelta::ToolInput {
            index: 0,
            partial_json: args.to_string(),
        },
        ModelDelta::BlockStop { index: 0 },
        ModelDelta::MessageStop {
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        },
    ]
}

async fn agent(model: Arc<ScriptedModel>, tier: u8) -> (AgentBuilder, Arc<dyn Runtime>) {
    let builder = AgentBuilder::new(model, LlmConfig::default());
    let runtime = builder
        .build(RuntimeSpec {
            tools: ToolRegistry::with_catalog_tools().all(),
            system_prompt: "You help maintain a threat catalog.".into(),
            reasoning_tier: ReasoningTier::new(tier),
        })
        .await
        .unwrap();
    (builder, runtime)
}

fn opts(limit: usize) -> RunOptions {
    RunOptions {
        artifact: None,
        recursion_limit: limit,
    }
}

fn prompt(text: &str) -> RunInput {
    RunInput::Prompt { text: text.into() }
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn plain_answer_streams_text_then_end_of_turn() {
    let model = Arc::new(ScriptedModel::default());
    model.push(text_reply("hello"));
    let (_, runtime) = agent(model.clone(), 1).await;

    let events: Vec<RawEvent> = runtime
        .stream("s1", prompt("hi"), opts(50))
        .unwrap()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(events[0], RawEvent::text("hello"));
    assert_eq!(events[1], RawEvent::stop(StopReason::EndTurn));
    assert!(matches!(
        events[2],
        RawEvent::Control(ControlSignal::StepCompleted { ref node, step: 1 }) if node == "agent"
    ));
    assert_eq!(events.len(), 3);

    let history = runtime.history("s1", 1);
    let messages = &history[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text(), "hello");

    let req = &model.requests.lock()[0];
    assert_eq!(req.settings.thinking.unwrap().budget_tokens, 8_000);
    assert_eq!(req.tools.len(), 3);
}

#[tokio::test]
async fn catalog_tool_interrupts_and_resume_completes_the_turn() {
    let model = Arc::new(ScriptedModel::default());
    model.push(tool_reply("tu_1", "add_threats"));
    model.push(text_reply("Added."));
    let (_, runtime) = agent(model.clone(), 0).await;

    let first: Vec<RawEvent> = runtime
        .stream("s1", prompt("add a spoofing threat"), opts(50))
        .unwrap()
        .map(|e| e.unwrap())
        .collect();

    let interrupt = first
        .iter()
        .find_map(|e| match e {
            RawEvent::Control(ControlSignal::Interrupt { value }) => Some(value.clone()),
            _ => None,
        })
        .expect("run should pause");
    assert_eq!(interrupt["tool_name"], "add_threats");
    assert_eq!(interrupt["payload"][0]["name"], "Token replay");
    assert_eq!(runtime.history("s1", 1)[0].pending_interrupt, Some(interrupt));

    let second: Vec<RawEvent> = runtime
        .stream(
            "s1",
            RunInput::Resume(ResumeOutcome::accepted("add_threats")),
            opts(50),
        )
        .unwrap()
        .map(|e| e.unwrap())
        .collect();

    let result = second
        .iter()
        .find_map(|e| match e {
            RawEvent::Message(MessageChunk::ToolResult(r)) => Some(r.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(result.tool_name, "add_threats");
    assert_eq!(result.status, ToolStatus::Success);
    assert!(second.contains(&RawEvent::text("Added.")));
    assert_eq!(model.calls(), 2);

    let snapshot = &runtime.history("s1", 1)[0];
    assert!(snapshot.pending_interrupt.is_none());
    // user, assistant(tool_use), tool_result, assistant(text)
    assert_eq!(snapshot.messages.len(), 4);
}

#[tokio::test]
async fn rejected_confirmation_is_a_tool_error() {
    let model = Arc::new(ScriptedModel::default());
    model.push(tool_reply("tu_1", "delete_threats"));
    model.push(text_reply("Understood."));
    let (_, runtime) = agent(model, 1).await;

    let _ = runtime
        .stream("s1", prompt("delete it"), opts(50))
        .unwrap()
        .count();

    let events: Vec<RawEvent> = runtime
        .stream(
            "s1",
            RunInput::Resume(ResumeOutcome::rejected("delete_threats", "user declined")),
            opts(50),
        )
        .unwrap()
        .map(|e| e.unwrap())
        .collect();

    let result = events
        .iter()
        .find_map(|e| match e {
            RawEvent::Message(MessageChunk::ToolResult(r)) => Some(r.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.content.contains("user declined"));
}

#[tokio::test]
async fn resume_without_pending_interrupt_fails() {
    let model = Arc::new(ScriptedModel::default());
    let (_, runtime) = agent(model, 1).await;
    let err = match runtime.stream(
        "fresh",
        RunInput::Resume(ResumeOutcome::accepted("add_threats")),
        opts(50),
    ) {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("no pending interrupt"));
}

#[tokio::test]
async fn dropping_the_run_mid_stream_closes_dangling_tool_calls() {
    let model = Arc::new(ScriptedModel::default());
    model.push(vec![
        ModelDelta::Text {
            index: 0,
            text: "Let me add".into(),
        },
        ModelDelta::BlockStop { index: 0 },
        ModelDelta::ToolUseStart {
            index: 1,
            id: "tu_9".into(),
            name: "add_threats".into(),
        },
        ModelDelta::ToolInput {
            index: 1,
            partial_json: "{}".into(),
        },
    ]);
    let (builder, runtime) = agent(model, 1).await;

    {
        let mut run = runtime.stream("s1", prompt("go"), opts(50)).unwrap();
        // Text, then the tool start; stop reading before the response ends.
        assert!(run.next().unwrap().is_ok());
        assert!(run.next().unwrap().is_ok());
    }

    let history = builder.checkpoints().history("s1", 1);
    let messages = &history[0].messages;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].text(), "Let me add");
    assert_eq!(messages[1].tool_use_ids(), vec!["tu_9"]);
    match &messages[2].content[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "tu_9");
            assert_eq!(content, CANCELLED_TOOL_RESPONSE);
            assert!(*is_error);
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[tokio::test]
async fn recursion_limit_surfaces_as_error() {
    // Unknown tools fail without pausing, so the loop keeps going.
    let model = Arc::new(ScriptedModel::default());
    for i in 0..5 {
        model.push(tool_reply(&format!("tu_{i}"), "missing_tool"));
    }
    let (_, runtime) = agent(model.clone(), 1).await;
    let items: Vec<Result<RawEvent>> = runtime.stream("s2", prompt("go"), opts(3)).unwrap().collect();
    let last = items.last().unwrap();
    assert!(matches!(last, Err(Error::RecursionLimit(3))));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn provider_error_mid_stream_ends_the_run() {
    let model = Arc::new(ScriptedModel::default());
    model.push_raw(vec![
        Ok(ModelDelta::Text {
            index: 0,
            text: "par".into(),
        }),
        Err(Error::Provider {
            provider: "scripted".into(),
            message: "overloaded".into(),
        }),
    ]);
    let (_, runtime) = agent(model, 1).await;

    let items: Vec<Result<RawEvent>> = runtime.stream("s1", prompt("go"), opts(50)).unwrap().collect();
    assert_eq!(items.len(), 2);
    assert!(items[1].is_err());

    let messages = &runtime.history("s1", 1)[0].messages;
    assert_eq!(messages.last().unwrap().text(), "par");
}

#[tokio::test]
async fn new_prompt_while_paused_closes_the_pending_call() {
    let model = Arc::new(ScriptedModel::default());
    model.push(tool_reply("tu_1", "edit_threats"));
    model.push(text_reply("ok"));
    let (_, runtime) = agent(model.clone(), 1).await;

    let _ = runtime.stream("s1", prompt("edit"), opts(50)).unwrap().count();
    let _ = runtime.stream("s1", prompt("never mind"), opts(50)).unwrap().count();

    let req = &model.requests.lock()[1];
    // user, assistant(tool_use), tool_result(cancelled), user
    assert_eq!(req.messages.len(), 4);
    assert!(matches!(
        &req.messages[2].content[0],
        ContentBlock::ToolResult { is_error: true, .. }
    ));
}

#[tokio::test]
async fn artifact_is_sent_but_not_checkpointed() {
    let model = Arc::new(ScriptedModel::default());
    model.push(text_reply("I see the diagram"));
    let (_, runtime) = agent(model.clone(), 1).await;

    let artifact = Arc::new(ts_domain::artifact::Artifact {
        encoding: ts_domain::artifact::ArtifactEncoding::Base64,
        data: "iVBORw0KGgo=".into(),
        media_type: "image/png".into(),
        size_bytes: 8,
    });
    let options = RunOptions {
        artifact: Some(artifact),
        recursion_limit: 50,
    };
    let _ = runtime.stream("s1", prompt("review"), options).unwrap().count();

    let req = &model.requests.lock()[0];
    assert!(matches!(
        &req.messages[0].content[0],
        ContentBlock::Image { media_type, .. } if media_type == "image/png"
    ));
    let stored = &runtime.history("s1", 1)[0].messages[0];
    assert!(stored
        .content
        .iter()
        .all(|b| !matches!(b, ContentBlock::Image { .. })));
}

#[tokio::test]
async fn tier_zero_builds_without_thinking() {
    let model = Arc::new(ScriptedModel::default());
    model.push(text_reply("hi"));
    let (_, runtime) = agent(model.clone(), 0).await;
    let _ = runtime.stream("s1", prompt("hi"), opts(50)).unwrap().count();
    assert!(model.requests.lock()[0].settings.thinking.is_none());
}

#[tokio::test]
async fn builder_rejects_empty_tool_set() {
    let builder = AgentBuilder::new(Arc::new(ScriptedModel::default()), LlmConfig::default());
    let result = builder
        .build(RuntimeSpec {
            tools: Vec::new(),
            system_prompt: String::new(),
            reasoning_tier: ReasoningTier::default(),
        })
        .await;
    assert!(matches!(result, Err(Error::Build(_))));
}

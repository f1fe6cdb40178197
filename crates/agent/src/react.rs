//! ReAct tool loop.
//!
//! A run alternates between an `agent` step (one streamed model call) and
//! a `tools` step (every tool call of the last assistant message) until
//! the model answers without calling tools, a tool pauses for
//! confirmation, or the step ceiling is hit. The loop is a lazy iterator:
//! each `next()` does only the blocking work needed for the next event.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use ts_domain::artifact::Artifact;
use ts_domain::error::{Error, Result};
use ts_domain::event::{
    ControlSignal, MessageChunk, RawEvent, StopReason, ToolResultChunk, ToolStatus,
};
use ts_domain::message::{ContentBlock, Message, Role};
use ts_domain::runtime::{EventIter, HistorySnapshot, RunInput, RunOptions, Runtime};
use ts_domain::tool::{ResumeOutcome, Tool, ToolCall, ToolInvocation, ToolOutcome};
use ts_providers::{ChatModel, ModelDelta, ModelRequest, ModelSettings, ModelStream};

use crate::checkpoint::{CheckpointStore, PendingInterrupt, SessionState};
use crate::turn::TurnBuffer;

/// Result content recorded for tool calls a stopped run never finished.
pub const CANCELLED_TOOL_RESPONSE: &str = "{\"response\": \"Tool invocation cancelled by user\"}";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ReactAgent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct AgentCore {
    model: Arc<dyn ChatModel>,
    settings: ModelSettings,
    system_prompt: String,
    tools: Vec<Arc<dyn Tool>>,
    checkpoints: Arc<CheckpointStore>,
}

impl AgentCore {
    fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

/// A built agent: model settings, prompt and tool set bound together.
///
/// Conversation state is not owned by the agent; it lives in the shared
/// [`CheckpointStore`] so a rebuilt agent continues existing sessions.
#[derive(Clone)]
pub struct ReactAgent {
    core: Arc<AgentCore>,
}

impl ReactAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        settings: ModelSettings,
        system_prompt: String,
        tools: Vec<Arc<dyn Tool>>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Self {
        Self {
            core: Arc::new(AgentCore {
                model,
                settings,
                system_prompt,
                tools,
                checkpoints,
            }),
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.core.settings
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.core.tools.iter().map(|t| t.name()).collect()
    }
}

impl Runtime for ReactAgent {
    fn stream(&self, session: &str, input: RunInput, options: RunOptions) -> Result<EventIter> {
        let run = AgentRun::start(Arc::clone(&self.core), session, input, options)?;
        Ok(Box::new(run))
    }

    fn history(&self, session: &str, depth: usize) -> Vec<HistorySnapshot> {
        self.core.checkpoints.history(session, depth)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentRun
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Phase {
    CallModel,
    Streaming {
        stream: ModelStream,
        turn: TurnBuffer,
    },
    RunTools {
        calls: VecDeque<ToolCall>,
        results: Vec<ContentBlock>,
        resume: Option<ResumeOutcome>,
    },
    Finished,
}

struct AgentRun {
    core: Arc<AgentCore>,
    session: String,
    state: Arc<Mutex<SessionState>>,
    artifact: Option<Arc<Artifact>>,
    recursion_limit: usize,
    steps: usize,
    phase: Phase,
    buffer: VecDeque<Result<RawEvent>>,
}

impl AgentRun {
    fn start(
        core: Arc<AgentCore>,
        session: &str,
        input: RunInput,
        options: RunOptions,
    ) -> Result<Self> {
        let state = core.checkpoints.session(session);

        let phase = {
            let mut st = state.lock();
            match input {
                RunInput::Prompt { text } => {
                    if let Some(pending) = st.pending.take() {
                        tracing::warn!(
                            session = %session,
                            abandoned = pending.calls.len(),
                            "new prompt while a tool awaits confirmation; closing pending calls"
                        );
                        let mut results = pending.completed;
                        results.extend(pending.calls.iter().map(cancelled_result));
                        st.messages.push(Message::tool_results(results));
                    }
                    st.messages.push(Message::user(text));
                    st.snapshot();
                    Phase::CallModel
                }
                RunInput::Resume(outcome) => {
                    let Some(pending) = st.pending.take() else {
                        return Err(Error::Tool {
                            tool: outcome.kind,
                            message: "session has no pending interrupt to resume".into(),
                        });
                    };
                    tracing::debug!(
                        session = %session,
                        tool = %outcome.kind,
                        rejected = outcome.error.is_some(),
                        "resuming paused tool call"
                    );
                    Phase::RunTools {
                        calls: pending.calls.into(),
                        results: pending.completed,
                        resume: Some(outcome),
                    }
                }
            }
        };

        Ok(Self {
            core,
            session: session.to_owned(),
            state,
            artifact: options.artifact,
            recursion_limit: options.recursion_limit,
            steps: 0,
            phase,
            buffer: VecDeque::new(),
        })
    }

    fn step_completed(&mut self, node: &str) {
        self.buffer
            .push_back(Ok(RawEvent::Control(ControlSignal::StepCompleted {
                node: node.to_string(),
                step: self.steps,
            })));
    }

    /// Count a step, failing once the ceiling is reached.
    fn begin_step(&mut self) -> Result<()> {
        if self.steps >= self.recursion_limit {
            return Err(Error::RecursionLimit(self.recursion_limit));
        }
        self.steps += 1;
        Ok(())
    }

    fn request(&self) -> ModelRequest {
        let mut messages = self.state.lock().messages.clone();
        if let Some(artifact) = &self.artifact {
            attach_artifact(&mut messages, artifact);
        }
        ModelRequest {
            settings: self.core.settings.clone(),
            system: self.core.system_prompt.clone(),
            messages,
            tools: self.core.tools.iter().map(|t| t.definition()).collect(),
        }
    }

    fn call_model(&mut self) -> Result<()> {
        self.begin_step()?;
        let req = self.request();
        tracing::debug!(
            session = %self.session,
            step = self.steps,
            messages = req.messages.len(),
            "agent step"
        );
        let stream = self.core.model.stream(&req)?;
        self.phase = Phase::Streaming {
            stream,
            turn: TurnBuffer::default(),
        };
        Ok(())
    }

    /// Commit a finished model response and pick the next phase.
    fn finish_turn(&mut self, turn: TurnBuffer, stop_reason: Option<StopReason>) {
        let (message, calls) = turn.finish(true);
        {
            let mut st = self.state.lock();
            if let Some(message) = message {
                st.messages.push(message);
            }
            st.snapshot();
        }

        if let Some(reason) = stop_reason {
            self.buffer.push_back(Ok(RawEvent::stop(reason)));
        }
        self.step_completed("agent");

        self.phase = if calls.is_empty() {
            Phase::Finished
        } else {
            Phase::RunTools {
                calls: calls.into(),
                results: Vec::new(),
                resume: None,
            }
        };
    }

    /// Run the next queued tool call, or commit the batch when done.
    fn run_next_tool(
        &mut self,
        mut calls: VecDeque<ToolCall>,
        mut results: Vec<ContentBlock>,
        mut resume: Option<ResumeOutcome>,
    ) {
        let Some(call) = calls.pop_front() else {
            {
                let mut st = self.state.lock();
                st.messages.push(Message::tool_results(results));
                st.snapshot();
            }
            self.steps += 1;
            self.step_completed("tools");
            self.phase = Phase::CallModel;
            return;
        };

        let answer = resume.take();
        let outcome = match self.core.tool(&call.tool_name) {
            Some(tool) => tool.invoke(ToolInvocation {
                call_id: &call.call_id,
                arguments: &call.arguments,
                resume: answer.as_ref(),
            }),
            None => ToolOutcome::Failed(format!("unknown tool '{}'", call.tool_name)),
        };

        let (content, status) = match outcome {
            ToolOutcome::Interrupt(value) => {
                tracing::info!(
                    session = %self.session,
                    tool = %call.tool_name,
                    "tool paused for confirmation"
                );
                calls.push_front(call);
                {
                    let mut st = self.state.lock();
                    st.pending = Some(PendingInterrupt {
                        calls: calls.into(),
                        completed: results,
                        value: value.clone(),
                    });
                    st.snapshot();
                }
                self.buffer.push_back(Ok(RawEvent::interrupt(value)));
                self.phase = Phase::Finished;
                return;
            }
            ToolOutcome::Complete(value) => (render_content(value), ToolStatus::Success),
            ToolOutcome::Failed(message) => {
                tracing::debug!(tool = %call.tool_name, error = %message, "tool failed");
                (json!({ "error": message }).to_string(), ToolStatus::Error)
            }
        };

        results.push(ContentBlock::ToolResult {
            tool_use_id: call.call_id.clone(),
            content: content.clone(),
            is_error: status == ToolStatus::Error,
        });
        self.buffer
            .push_back(Ok(RawEvent::Message(MessageChunk::ToolResult(
                ToolResultChunk {
                    tool_call_id: call.call_id,
                    tool_name: call.tool_name,
                    content,
                    status,
                },
            ))));
        self.phase = Phase::RunTools {
            calls,
            results,
            resume,
        };
    }

    /// Leave the session consistent after a run that stopped mid-phase:
    /// keep partial assistant output and close every dangling tool call.
    fn abandon(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Finished);
        let mut st = self.state.lock();
        match phase {
            Phase::Streaming { turn, .. } => {
                if turn.is_empty() {
                    return;
                }
                let (message, calls) = turn.finish(false);
                if let Some(message) = message {
                    st.messages.push(message);
                }
                if !calls.is_empty() {
                    st.messages
                        .push(Message::tool_results(calls.iter().map(cancelled_result).collect()));
                }
            }
            Phase::RunTools {
                calls,
                mut results,
                ..
            } => {
                results.extend(calls.iter().map(cancelled_result));
                st.messages.push(Message::tool_results(results));
            }
            Phase::CallModel | Phase::Finished => return,
        }
        st.snapshot();
        tracing::info!(session = %self.session, "run stopped early; session history closed out");
    }

    fn fail(&mut self, err: Error) -> Option<Result<RawEvent>> {
        self.abandon();
        self.buffer.clear();
        Some(Err(err))
    }
}

impl Iterator for AgentRun {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }

            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Finished => return None,
                Phase::CallModel => {
                    self.phase = Phase::CallModel;
                    if let Err(e) = self.call_model() {
                        self.phase = Phase::Finished;
                        return Some(Err(e));
                    }
                }
                Phase::Streaming { mut stream, mut turn } => match stream.next() {
                    Some(Ok(ModelDelta::MessageStop { stop_reason, usage })) => {
                        if let Some(usage) = usage {
                            tracing::debug!(
                                input_tokens = usage.input_tokens,
                                output_tokens = usage.output_tokens,
                                "model call finished"
                            );
                        }
                        self.finish_turn(turn, stop_reason);
                    }
                    Some(Ok(delta)) => {
                        if let Some(event) = turn.apply(delta) {
                            self.buffer.push_back(Ok(event));
                        }
                        self.phase = Phase::Streaming { stream, turn };
                    }
                    Some(Err(e)) => {
                        self.phase = Phase::Streaming { stream, turn };
                        return self.fail(e);
                    }
                    None => self.finish_turn(turn, None),
                },
                Phase::RunTools {
                    calls,
                    results,
                    resume,
                } => self.run_next_tool(calls, results, resume),
            }
        }
    }
}

impl Drop for AgentRun {
    fn drop(&mut self) {
        self.abandon();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn cancelled_result(call: &ToolCall) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: call.call_id.clone(),
        content: CANCELLED_TOOL_RESPONSE.to_string(),
        is_error: true,
    }
}

fn render_content(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Put the image in front of the first user message of a request copy.
/// The checkpointed history never carries the image.
fn attach_artifact(messages: &mut [Message], artifact: &Artifact) {
    if let Some(first) = messages.iter_mut().find(|m| m.role == Role::User) {
        first.content.insert(
            0,
            ContentBlock::Image {
                media_type: artifact.media_type.clone(),
                data: artifact.data.clone(),
            },
        );
    }
}

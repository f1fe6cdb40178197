//! In-memory per-session checkpoint store.
//!
//! A session's conversation lives here for the lifetime of the process.
//! Every committed step appends a snapshot; history readouts return the
//! newest snapshots first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use ts_domain::message::{ContentBlock, Message};
use ts_domain::runtime::HistorySnapshot;
use ts_domain::tool::ToolCall;

/// Snapshots retained per session.
const MAX_SNAPSHOTS: usize = 32;

/// A run suspended inside the tool phase, waiting for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInterrupt {
    /// The call that raised the interrupt, followed by any calls of the
    /// same assistant message that have not run yet.
    pub calls: Vec<ToolCall>,
    /// Results of calls that finished before the interrupt.
    pub completed: Vec<ContentBlock>,
    /// Payload surfaced to the caller.
    pub value: Value,
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub pending: Option<PendingInterrupt>,
    pub step: usize,
    snapshots: Vec<HistorySnapshot>,
}

impl SessionState {
    /// Record the current messages as a new snapshot.
    pub fn snapshot(&mut self) {
        self.step += 1;
        self.snapshots.push(HistorySnapshot {
            step: self.step,
            created_at: Utc::now(),
            messages: self.messages.clone(),
            pending_interrupt: self.pending.as_ref().map(|p| p.value.clone()),
        });
        if self.snapshots.len() > MAX_SNAPSHOTS {
            let excess = self.snapshots.len() - MAX_SNAPSHOTS;
            self.snapshots.drain(..excess);
        }
    }
}

/// Session token → conversation state.
#[derive(Default)]
pub struct CheckpointStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State handle for `session`, created empty on first use.
    pub fn session(&self, session: &str) -> Arc<Mutex<SessionState>> {
        if let Some(existing) = self.sessions.read().get(session) {
            return Arc::clone(existing);
        }
        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(session.to_owned()).or_default())
    }

    /// Up to `depth` snapshots of `session`, newest first.
    pub fn history(&self, session: &str, depth: usize) -> Vec<HistorySnapshot> {
        let Some(state) = self.sessions.read().get(session).cloned() else {
            return Vec::new();
        };
        let state = state.lock();
        state.snapshots.iter().rev().take(depth).cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_session_has_no_history() {
        let store = CheckpointStore::new();
        assert!(store.history("nope", 5).is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let store = CheckpointStore::new();
        let handle = store.session("s1");
        {
            let mut state = handle.lock();
            state.messages.push(Message::user("one"));
            state.snapshot();
            state.messages.push(Message::user("two"));
            state.snapshot();
        }
        let history = store.history("s1", 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].step, 2);
        assert_eq!(history[0].messages.len(), 2);
    }

    #[test]
    fn snapshots_are_capped() {
        let store = CheckpointStore::new();
        let handle = store.session("s1");
        {
            let mut state = handle.lock();
            for _ in 0..(MAX_SNAPSHOTS + 5) {
                state.snapshot();
            }
        }
        let history = store.history("s1", usize::MAX);
        assert_eq!(history.len(), MAX_SNAPSHOTS);
        assert_eq!(history[0].step, MAX_SNAPSHOTS + 5);
    }

    #[test]
    fn same_token_yields_same_state() {
        let store = CheckpointStore::new();
        let a = store.session("s1");
        let b = store.session("s1");
        assert!(Arc::ptr_eq(&a, &b));
    }
}

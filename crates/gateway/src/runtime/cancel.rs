//! Per-session cancellation of in-flight streams.
//!
//! Each stream registers a token for its session. `cancel()` trips it; the
//! bridge worker notices before pulling the next event and abandons the run.
//! A registration removes itself when dropped, unless a newer stream for
//! the same session has replaced it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

struct Entry {
    id: u64,
    token: CancellationToken,
}

/// Session token → cancellation token of its running stream.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a new cancel token for a session.
    pub fn register(self: &Arc<Self>, session: &str) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.tokens.lock().insert(
            session.to_owned(),
            Entry {
                id,
                token: token.clone(),
            },
        );
        Registration {
            map: Arc::clone(self),
            session: session.to_owned(),
            id,
            token,
        }
    }

    /// Cancel the running stream of a session. Returns true if one was found.
    pub fn cancel(&self, session: &str) -> bool {
        match self.tokens.lock().get(session) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, session: &str) -> bool {
        self.tokens.lock().contains_key(session)
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }

    fn remove(&self, session: &str, id: u64) {
        let mut tokens = self.tokens.lock();
        if tokens.get(session).is_some_and(|e| e.id == id) {
            tokens.remove(session);
        }
    }
}

/// A stream's entry in the [`CancelMap`]; unregisters on drop.
pub struct Registration {
    map: Arc<CancelMap>,
    session: String,
    id: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.map.remove(&self.session, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_cancel_and_drop() {
        let map = Arc::new(CancelMap::new());
        let reg = map.register("s1");
        assert!(map.is_running("s1"));
        assert!(!reg.token().is_cancelled());

        assert!(map.cancel("s1"));
        assert!(reg.token().is_cancelled());

        drop(reg);
        assert!(!map.is_running("s1"));
        assert!(!map.cancel("s1"));
    }

    #[test]
    fn cancel_unknown_session_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("ghost"));
        assert!(map.is_empty());
    }

    #[test]
    fn stale_registration_does_not_remove_newer_one() {
        let map = Arc::new(CancelMap::new());
        let old = map.register("s1");
        let new = map.register("s1");
        drop(old);
        assert!(map.is_running("s1"));

        map.cancel("s1");
        assert!(new.token().is_cancelled());
        drop(new);
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn sessions_are_independent() {
        let map = Arc::new(CancelMap::new());
        let a = map.register("a");
        let b = map.register("b");
        map.cancel("a");
        assert!(a.token().is_cancelled());
        assert!(!b.token().is_cancelled());
    }
}

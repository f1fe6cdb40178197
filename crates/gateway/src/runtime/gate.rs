//! Process-wide admission control for heavy (streaming) requests.
//!
//! One permit, no waiters: a second heavy request while one is running is
//! rejected immediately. The permit is released when it is dropped, which
//! happens when the stream that owns it finishes, fails or is abandoned.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct AdmissionGate {
    permits: Arc<Semaphore>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one heavy request.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

/// Another heavy request is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the agent is busy with another request; retry shortly")]
pub struct Busy;

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_enter(&self) -> Result<Permit, Busy> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .map(|permit| Permit { _permit: permit })
            .map_err(|_| Busy)
    }

    /// True while a heavy request holds the permit.
    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_entry_is_rejected_without_waiting() {
        let gate = AdmissionGate::new();
        let permit = gate.try_enter().unwrap();
        assert!(gate.is_busy());
        assert_eq!(gate.try_enter().unwrap_err(), Busy);
        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_ok());
    }

    #[tokio::test]
    async fn permit_moved_into_task_releases_on_completion() {
        let gate = AdmissionGate::new();
        let permit = gate.try_enter().unwrap();
        tokio::spawn(async move {
            let _held = permit;
        })
        .await
        .unwrap();
        assert!(gate.try_enter().is_ok());
    }
}

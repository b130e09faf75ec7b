//! Liveness flag and exit outcome of a managed process

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::completion::Completion;
use crate::outcome::CompletionOutcome;

/// Owns the `alive` flag and the single completion outcome
///
/// `alive` flips to false once, either when the exit is observed or when a
/// kill confirms death. The outcome is recorded independently by the first
/// exit notification, so waiters are answered even when a kill marked the
/// process dead first.
#[derive(Debug)]
pub struct LifecycleTracker {
    name: String,
    alive: AtomicBool,
    outcome: Completion<CompletionOutcome>,
}

impl LifecycleTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alive: AtomicBool::new(true),
            outcome: Completion::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Flip `alive` to false; returns true for the call that did it
    pub fn mark_dead(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    /// Record the exit of the OS process
    ///
    /// Only the first call computes an outcome; repeats are ignored.
    pub fn on_exit(&self, pid: u32, code: Option<i32>) -> bool {
        self.mark_dead();
        let outcome = CompletionOutcome::from_exit(&self.name, pid, code);
        if self.outcome.resolve(outcome) {
            info!(
                command = %self.name,
                pid = %pid,
                code = code.unwrap_or(0),
                "Process exited"
            );
            true
        } else {
            debug!(command = %self.name, pid = %pid, "Ignoring repeated exit notification");
            false
        }
    }

    /// Whether the exit has been recorded
    pub fn has_exited(&self) -> bool {
        self.outcome.is_resolved()
    }

    /// Outcome if the process already exited
    pub fn outcome(&self) -> Option<CompletionOutcome> {
        self.outcome.get()
    }

    /// Wait for the process to exit
    pub async fn wait(&self) -> CompletionOutcome {
        self.outcome.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_exit_zero_resolves_success() {
        let tracker = LifecycleTracker::new("tool start");
        assert!(tracker.is_alive());

        assert!(tracker.on_exit(100, Some(0)));
        assert!(!tracker.is_alive());
        assert_eq!(tracker.wait().await, CompletionOutcome::Success);
    }

    #[tokio::test]
    async fn test_repeated_exit_is_ignored() {
        let tracker = LifecycleTracker::new("tool build");
        assert!(tracker.on_exit(100, Some(7)));
        assert!(!tracker.on_exit(100, Some(0)));

        match tracker.wait().await {
            CompletionOutcome::Failure(message) => assert!(message.contains("code=7")),
            CompletionOutcome::Success => panic!("Outcome was overwritten"),
        }
    }

    #[tokio::test]
    async fn test_many_waiters_see_same_outcome() {
        let tracker = Arc::new(LifecycleTracker::new("tool deploy"));

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move { tracker.wait().await })
            })
            .collect();

        tracker.on_exit(7, Some(3));
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), tracker.outcome().unwrap());
        }
        assert_eq!(tracker.wait().await, tracker.outcome().unwrap());
    }

    #[tokio::test]
    async fn test_exit_after_kill_still_records_outcome() {
        let tracker = LifecycleTracker::new("tool start");
        assert!(tracker.mark_dead());
        assert!(!tracker.mark_dead());
        assert!(!tracker.has_exited());

        tracker.on_exit(9, None);
        assert_eq!(tracker.wait().await, CompletionOutcome::Success);
    }
}

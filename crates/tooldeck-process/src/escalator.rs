//! Graceful-then-forceful termination of a process tree
//!
//! `kill()` waits for spawn readiness, sends the graceful signal to the whole
//! tree, then polls liveness until either the process is gone or the grace
//! period runs out, at which point exactly one forceful signal is sent.
//! Concurrent callers share the in-flight sequence; calls on a dead process
//! return immediately.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::completion::Completion;
use crate::config::TerminationPolicy;
use crate::dispatch::OutputDispatcher;
use crate::lifecycle::LifecycleTracker;
use crate::signal::ProcessSignaller;

/// Drives the kill sequence for one managed process
#[derive(Debug)]
pub struct TerminationEscalator {
    name: String,
    readiness: Arc<Completion<u32>>,
    lifecycle: Arc<LifecycleTracker>,
    dispatcher: Arc<OutputDispatcher>,
    signaller: Arc<dyn ProcessSignaller>,
    policy: TerminationPolicy,
    /// Set while a sequence is running; doubles as the `killing` flag
    in_flight: Mutex<Option<Arc<Completion<()>>>>,
}

impl TerminationEscalator {
    pub fn new(
        name: impl Into<String>,
        readiness: Arc<Completion<u32>>,
        lifecycle: Arc<LifecycleTracker>,
        dispatcher: Arc<OutputDispatcher>,
        signaller: Arc<dyn ProcessSignaller>,
        policy: TerminationPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            readiness,
            lifecycle,
            dispatcher,
            signaller,
            policy: policy.clamped(),
            in_flight: Mutex::new(None),
        }
    }

    pub fn alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    /// Whether a kill sequence is in progress
    pub fn is_killing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Kill the process tree and wait until it is confirmed dead
    ///
    /// Never fails: signal delivery errors are logged, and only observed
    /// liveness decides when the sequence ends.
    pub async fn kill(self: &Arc<Self>) {
        let pid = self.readiness.wait().await;

        let done = {
            let mut in_flight = self.in_flight.lock();
            if let Some(done) = in_flight.as_ref() {
                debug!(command = %self.name, pid = %pid, "Kill already in progress");
                Arc::clone(done)
            } else if !self.lifecycle.is_alive() {
                debug!(command = %self.name, pid = %pid, "Process already dead");
                return;
            } else {
                let done = Arc::new(Completion::new());
                *in_flight = Some(Arc::clone(&done));

                // Runs detached so a cancelled caller cannot strand other waiters
                let escalator = Arc::clone(self);
                tokio::spawn(async move {
                    let _release = ReleaseOnDrop(&escalator);
                    escalator.run(pid).await;
                });
                done
            }
        };

        done.wait().await;
    }

    async fn run(&self, pid: u32) {
        info!(command = %self.name, pid = %pid, "Killing process");

        if let Err(e) = self.signaller.terminate_tree(pid) {
            warn!(command = %self.name, pid = %pid, error = %e, "Failed to send graceful signal");
        }

        let forced = !self.await_exit(pid).await;
        if forced {
            if let Err(e) = self.signaller.kill_tree(pid) {
                warn!(command = %self.name, pid = %pid, error = %e, "Failed to send forceful signal");
            }
            info!(command = %self.name, pid = %pid, "Process forcefully killed");
        } else {
            info!(command = %self.name, pid = %pid, "Process gracefully killed");
        }

        self.finish();
    }

    /// Poll liveness until the process is gone (true) or the grace period
    /// elapses with it still running (false). Both timers are dropped on return.
    async fn await_exit(&self, pid: u32) -> bool {
        let mut poll = time::interval_at(
            Instant::now() + self.policy.poll_interval,
            self.policy.poll_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = time::sleep(self.policy.grace_period);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if !self.is_running(pid) {
                        return true;
                    }
                }
                _ = &mut deadline => {
                    return !self.is_running(pid);
                }
            }
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        !self.lifecycle.has_exited() && self.signaller.is_running(pid)
    }

    fn finish(&self) {
        self.dispatcher.disable_all();
        self.lifecycle.mark_dead();
        self.release();
    }

    /// Clear the in-flight sequence and wake its waiters
    fn release(&self) {
        let done = self.in_flight.lock().take();
        if let Some(done) = done {
            done.resolve(());
        }
    }
}

/// Releases kill waiters even if the sequence task unwinds
struct ReleaseOnDrop<'a>(&'a TerminationEscalator);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!(command = %self.0.name, "Kill sequence aborted");
        }
        self.0.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use regex::Regex;

    /// Records signals; the fake process dies on the graceful signal only if
    /// `obeys_term` is set, and always dies on the forceful one.
    #[derive(Debug, Default)]
    struct FakeSignaller {
        obeys_term: bool,
        running: AtomicBool,
        terms: AtomicUsize,
        kills: AtomicUsize,
        polls: AtomicUsize,
    }

    impl FakeSignaller {
        fn new(obeys_term: bool) -> Arc<Self> {
            Arc::new(Self {
                obeys_term,
                running: AtomicBool::new(true),
                ..Default::default()
            })
        }
    }

    impl ProcessSignaller for FakeSignaller {
        fn terminate_tree(&self, _pid: u32) -> io::Result<()> {
            self.terms.fetch_add(1, Ordering::SeqCst);
            if self.obeys_term {
                self.running.store(false, Ordering::SeqCst);
            }
            Ok(())
        }

        fn kill_tree(&self, _pid: u32) -> io::Result<()> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_running(&self, _pid: u32) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.running.load(Ordering::SeqCst)
        }
    }

    /// Refuses to deliver anything
    #[derive(Debug)]
    struct BrokenSignaller;

    impl ProcessSignaller for BrokenSignaller {
        fn terminate_tree(&self, _pid: u32) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn kill_tree(&self, _pid: u32) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn is_running(&self, _pid: u32) -> bool {
            true
        }
    }

    struct Fixture {
        readiness: Arc<Completion<u32>>,
        lifecycle: Arc<LifecycleTracker>,
        dispatcher: Arc<OutputDispatcher>,
        escalator: Arc<TerminationEscalator>,
    }

    /// Dies on the graceful signal but panics when asked about liveness
    #[derive(Debug)]
    struct PanickingSignaller;

    impl ProcessSignaller for PanickingSignaller {
        fn terminate_tree(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }

        fn kill_tree(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }

        fn is_running(&self, _pid: u32) -> bool {
            panic!("liveness check failed")
        }
    }

    fn fixture(signaller: Arc<dyn ProcessSignaller>) -> Fixture {
        fixture_with_policy(signaller, TerminationPolicy::default())
    }

    fn fixture_with_policy(
        signaller: Arc<dyn ProcessSignaller>,
        policy: TerminationPolicy,
    ) -> Fixture {
        let readiness = Arc::new(Completion::new());
        let lifecycle = Arc::new(LifecycleTracker::new("tool start"));
        let dispatcher = Arc::new(OutputDispatcher::new());
        let escalator = Arc::new(TerminationEscalator::new(
            "tool start",
            Arc::clone(&readiness),
            Arc::clone(&lifecycle),
            Arc::clone(&dispatcher),
            signaller,
            policy,
        ));
        Fixture {
            readiness,
            lifecycle,
            dispatcher,
            escalator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_kill_sends_no_forceful_signal() {
        let signaller = FakeSignaller::new(true);
        let f = fixture(signaller.clone());
        f.readiness.resolve(1234);
        let index = f.dispatcher.register(Regex::new(".").unwrap(), |_| {});

        let started = Instant::now();
        f.escalator.kill().await;

        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(signaller.terms.load(Ordering::SeqCst), 1);
        assert_eq!(signaller.kills.load(Ordering::SeqCst), 0);
        assert!(!f.escalator.alive());
        assert!(!f.escalator.is_killing());
        assert!(!f.dispatcher.is_enabled(index));

        // The poll stopped with the sequence
        let polls = signaller.polls.load(Ordering::SeqCst);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(signaller.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_process_is_forcefully_killed() {
        let signaller = FakeSignaller::new(false);
        let f = fixture(signaller.clone());
        f.readiness.resolve(1234);

        let started = Instant::now();
        f.escalator.kill().await;

        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert_eq!(signaller.terms.load(Ordering::SeqCst), 1);
        assert_eq!(signaller.kills.load(Ordering::SeqCst), 1);
        assert!(!f.escalator.alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_kills_share_one_sequence() {
        let signaller = FakeSignaller::new(false);
        let f = fixture(signaller.clone());
        f.readiness.resolve(1234);

        let callers: Vec<_> = (0..3)
            .map(|_| {
                let escalator = Arc::clone(&f.escalator);
                tokio::spawn(async move { escalator.kill().await })
            })
            .collect();
        for caller in callers {
            caller.await.unwrap();
        }

        assert_eq!(signaller.terms.load(Ordering::SeqCst), 1);
        assert_eq!(signaller.kills.load(Ordering::SeqCst), 1);
        assert!(!f.escalator.alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_on_dead_process_is_noop() {
        let signaller = FakeSignaller::new(true);
        let f = fixture(signaller.clone());
        f.readiness.resolve(1234);
        f.lifecycle.on_exit(1234, Some(0));

        f.escalator.kill().await;
        f.escalator.kill().await;
        assert_eq!(signaller.terms.load(Ordering::SeqCst), 0);
        assert_eq!(signaller.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_waits_for_readiness() {
        let signaller = FakeSignaller::new(true);
        let f = fixture(signaller.clone());

        let caller = {
            let escalator = Arc::clone(&f.escalator);
            tokio::spawn(async move { escalator.kill().await })
        };
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(signaller.terms.load(Ordering::SeqCst), 0);
        assert!(!caller.is_finished());

        f.readiness.resolve(1234);
        caller.await.unwrap();
        assert_eq!(signaller.terms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_event_ends_poll_early() {
        let signaller = FakeSignaller::new(false);
        let f = fixture(signaller.clone());
        f.readiness.resolve(1234);

        let lifecycle = Arc::clone(&f.lifecycle);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(250)).await;
            lifecycle.on_exit(1234, None);
        });

        f.escalator.kill().await;
        assert_eq!(signaller.kills.load(Ordering::SeqCst), 0);
        assert_eq!(f.lifecycle.outcome(), Some(crate::CompletionOutcome::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_failures_do_not_surface() {
        let f = fixture(Arc::new(BrokenSignaller));
        f.readiness.resolve(1234);

        f.escalator.kill().await;
        assert!(!f.escalator.alive());
        assert!(!f.escalator.is_killing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_still_completes() {
        let signaller = FakeSignaller::new(true);
        let policy = TerminationPolicy {
            poll_interval: Duration::ZERO,
            grace_period: Duration::from_millis(50),
        };
        let f = fixture_with_policy(signaller.clone(), policy);
        f.readiness.resolve(1234);

        time::timeout(Duration::from_secs(1), f.escalator.kill())
            .await
            .unwrap();
        assert!(!f.escalator.alive());
        assert!(!f.escalator.is_killing());
        assert_eq!(signaller.kills.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_poll_interval_still_completes() {
        let signaller = FakeSignaller::new(false);
        let policy = TerminationPolicy {
            poll_interval: Duration::MAX,
            grace_period: Duration::from_millis(500),
        };
        let f = fixture_with_policy(signaller.clone(), policy);
        f.readiness.resolve(1234);

        time::timeout(Duration::from_secs(120), f.escalator.kill())
            .await
            .unwrap();
        assert_eq!(signaller.kills.load(Ordering::SeqCst), 1);
        assert!(!f.escalator.is_killing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_sequence_releases_waiters() {
        let f = fixture(Arc::new(PanickingSignaller));
        f.readiness.resolve(1234);

        time::timeout(Duration::from_secs(10), f.escalator.kill())
            .await
            .unwrap();
        assert!(!f.escalator.is_killing());

        // A later call starts a fresh sequence instead of hanging
        time::timeout(Duration::from_secs(10), f.escalator.kill())
            .await
            .unwrap();
        assert!(!f.escalator.is_killing());
    }
}

//! Handle to a launched tool process

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tokio::process::ChildStdin;

use crate::{
    completion::Completion,
    dispatch::OutputDispatcher,
    error::{ProcessError, Result},
    escalator::TerminationEscalator,
    lifecycle::LifecycleTracker,
    outcome::CompletionOutcome,
};

/// What was launched and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub package: String,
    pub bin: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Executable the bin resolved to
    pub bin_path: PathBuf,
}

/// Managed tool process
///
/// Cheap to clone; every clone observes the same process. Output matchers,
/// the exit outcome and the kill sequence are shared.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    identity: ProcessIdentity,
    name: String,
    readiness: Arc<Completion<u32>>,
    dispatcher: Arc<OutputDispatcher>,
    lifecycle: Arc<LifecycleTracker>,
    escalator: Arc<TerminationEscalator>,
    stdin: Mutex<Option<ChildStdin>>,
}

impl ManagedProcess {
    pub(crate) fn new(
        identity: ProcessIdentity,
        name: String,
        readiness: Arc<Completion<u32>>,
        dispatcher: Arc<OutputDispatcher>,
        lifecycle: Arc<LifecycleTracker>,
        escalator: Arc<TerminationEscalator>,
        stdin: Option<ChildStdin>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                name,
                readiness,
                dispatcher,
                lifecycle,
                escalator,
                stdin: Mutex::new(stdin),
            }),
        }
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.inner.identity
    }

    pub fn package(&self) -> &str {
        &self.inner.identity.package
    }

    pub fn bin(&self) -> &str {
        &self.inner.identity.bin
    }

    pub fn command(&self) -> &str {
        &self.inner.identity.command
    }

    pub fn args(&self) -> &[String] {
        &self.inner.identity.args
    }

    pub fn cwd(&self) -> &Path {
        &self.inner.identity.cwd
    }

    /// `"<package> <command> <args...>"`, as used in logs
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Process ID, once the OS has reported it
    pub fn pid(&self) -> Option<u32> {
        self.inner.readiness.get()
    }

    /// Wait for spawn readiness and return the pid
    pub async fn ready(&self) -> u32 {
        self.inner.readiness.wait().await
    }

    /// Call `handler` for every output chunk matching `pattern`
    pub fn on<F>(&self, pattern: Regex, handler: F) -> Result<usize>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.ensure_alive()?;
        Ok(self.inner.dispatcher.register(pattern, handler))
    }

    /// Call `handler` for the first output chunk matching `pattern`
    pub fn once<F>(&self, pattern: Regex, handler: F) -> Result<usize>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.ensure_alive()?;
        Ok(self.inner.dispatcher.register_once(pattern, handler))
    }

    /// Disable a matcher. Safe to repeat.
    pub fn off(&self, index: usize) {
        self.inner.dispatcher.disable(index);
    }

    /// Wait for the process to exit
    ///
    /// A non-zero exit is reported as [`CompletionOutcome::Failure`], never as
    /// an error.
    pub async fn wait(&self) -> CompletionOutcome {
        self.inner.lifecycle.wait().await
    }

    /// Wait for an output chunk matching `resolve` and return its text
    ///
    /// Fails with [`ProcessError::PatternRejected`] if `reject` matches first,
    /// or [`ProcessError::ExitedBeforeMatch`] if the process ends before
    /// either. There is no timeout; wrap in `tokio::time::timeout` if needed.
    pub async fn wait_for(&self, resolve: Regex, reject: Option<Regex>) -> Result<String> {
        self.ensure_alive()?;
        let exited = || ProcessError::ExitedBeforeMatch {
            name: self.inner.name.clone(),
        };

        tokio::select! {
            biased;
            matched = self.inner.dispatcher.wait_for(resolve, reject) => {
                matched.unwrap_or_else(|| Err(exited()))
            }
            _ = self.inner.lifecycle.wait() => Err(exited()),
        }
    }

    /// Terminate the process tree; returns once it is confirmed dead
    pub async fn kill(&self) {
        self.inner.escalator.kill().await;
    }

    pub fn alive(&self) -> bool {
        self.inner.escalator.alive()
    }

    /// Whether a kill sequence is in progress
    pub fn is_killing(&self) -> bool {
        self.inner.escalator.is_killing()
    }

    /// Outcome if the process already exited
    pub fn outcome(&self) -> Option<CompletionOutcome> {
        self.inner.lifecycle.outcome()
    }

    /// Take stdin handle
    pub fn take_stdin(&self) -> Option<ChildStdin> {
        self.inner.stdin.lock().take()
    }

    /// Whether both handles refer to the same launch
    pub fn is_same(&self, other: &ManagedProcess) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.alive() {
            Ok(())
        } else {
            Err(ProcessError::NotAlive {
                name: self.inner.name.clone(),
            })
        }
    }
}

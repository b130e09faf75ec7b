//! Single-occupant slot for server-style tools
//!
//! A host usually runs at most one preview server and one deploy server. A
//! slot makes sure the previous occupant is confirmed dead, and its port free,
//! before the replacement is launched.

use regex::Regex;
use tokio::sync::Mutex;
use tracing::info;

use crate::child::ManagedProcess;
use crate::error::Result;

/// Holds at most one running process under a name
#[derive(Debug)]
pub struct ProcessSlot {
    name: String,
    current: Mutex<Option<ManagedProcess>>,
}

impl ProcessSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current occupant, if any
    pub async fn current(&self) -> Option<ManagedProcess> {
        self.current.lock().await.clone()
    }

    /// Kill the current occupant, then launch and store a replacement
    ///
    /// The slot stays locked for the whole swap, so concurrent replacements
    /// run one after the other. If `launch` fails the slot is left empty.
    pub async fn replace_with<F>(&self, launch: F) -> Result<ManagedProcess>
    where
        F: FnOnce() -> Result<ManagedProcess>,
    {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            info!(slot = %self.name, command = %previous.name(), "Stopping previous process");
            previous.kill().await;
        }

        let process = launch()?;
        info!(slot = %self.name, command = %process.name(), pid = ?process.pid(), "Slot occupied");
        *current = Some(process.clone());
        Ok(process)
    }

    /// Replace the occupant and wait until its output matches `ready`
    ///
    /// If the handshake fails the new process is killed and the slot emptied.
    pub async fn start_and_wait_for<F>(
        &self,
        launch: F,
        ready: Regex,
        reject: Option<Regex>,
    ) -> Result<ManagedProcess>
    where
        F: FnOnce() -> Result<ManagedProcess>,
    {
        let process = self.replace_with(launch).await?;
        match process.wait_for(ready, reject).await {
            Ok(_) => Ok(process),
            Err(e) => {
                process.kill().await;
                let mut current = self.current.lock().await;
                if current.as_ref().is_some_and(|occupant| occupant.is_same(&process)) {
                    *current = None;
                }
                Err(e)
            }
        }
    }

    /// Kill and clear the occupant; returns whether there was one
    pub async fn stop(&self) -> bool {
        let mut current = self.current.lock().await;
        match current.take() {
            Some(process) => {
                info!(slot = %self.name, command = %process.name(), "Stopping process");
                process.kill().await;
                true
            }
            None => false,
        }
    }
}

//! Process launcher - spawns tools and wires their output and exit

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    child::{ManagedProcess, ProcessIdentity},
    completion::Completion,
    config::LaunchRequest,
    dispatch::OutputDispatcher,
    env::LaunchEnv,
    error::{ProcessError, Result},
    escalator::TerminationEscalator,
    host::BinaryResolver,
    lifecycle::LifecycleTracker,
    settings::LauncherSettings,
    signal::{OsSignaller, ProcessSignaller},
};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Launches tool processes
///
/// Holds the host collaborators (binary resolver, environment, signaller) and
/// the settings every launch shares.
pub struct ProcessLauncher {
    resolver: Arc<dyn BinaryResolver>,
    env: LaunchEnv,
    settings: LauncherSettings,
    signaller: Arc<dyn ProcessSignaller>,
}

impl ProcessLauncher {
    /// Create new process launcher
    pub fn new(
        resolver: impl BinaryResolver + 'static,
        env: LaunchEnv,
        settings: LauncherSettings,
    ) -> Self {
        if let Err(e) = settings.validate() {
            warn!(error = %e, "Launcher settings out of range, clamping the poll interval");
        }
        Self {
            resolver: Arc::new(resolver),
            env,
            settings,
            signaller: Arc::new(OsSignaller),
        }
    }

    /// Replace the OS signaller
    pub fn with_signaller(mut self, signaller: impl ProcessSignaller + 'static) -> Self {
        self.signaller = Arc::new(signaller);
        self
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    /// Launch a tool
    ///
    /// # Examples
    /// ```no_run
    /// use std::path::{Path, PathBuf};
    /// use tooldeck_process::{LaunchEnv, LaunchRequest, LauncherSettings, ProcessLauncher};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let resolver = |_pkg: &str, bin: &str, base: &Path| -> std::io::Result<PathBuf> {
    ///     Ok(base.join("node_modules").join(".bin").join(bin))
    /// };
    /// let launcher = ProcessLauncher::new(resolver, LaunchEnv::inherit(), LauncherSettings::default());
    /// let server = launcher.launch(
    ///     LaunchRequest::new("@dcl/sdk-commands", "sdk-commands", "start").args(["--port", "8000"]),
    /// )?;
    /// server.wait_for(regex::Regex::new("(?i)available")?, None).await?;
    /// server.kill().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn launch(&self, request: LaunchRequest) -> Result<ManagedProcess> {
        self.launch_with(request, |_| {})
    }

    /// Launch a tool, running `setup` before any output is dispatched
    ///
    /// Matchers registered in `setup` see the very first chunk.
    pub fn launch_with<F>(&self, request: LaunchRequest, setup: F) -> Result<ManagedProcess>
    where
        F: FnOnce(&ManagedProcess),
    {
        let base_path = request
            .base_path
            .clone()
            .unwrap_or_else(|| self.settings.root_path.clone());
        let cwd = request
            .cwd
            .clone()
            .unwrap_or_else(|| self.settings.root_path.clone());
        let name = request.display_name();

        let bin_path = self
            .resolver
            .resolve(&request.package, &request.bin, &base_path)
            .map_err(|source| ProcessError::ResolveFailed {
                package: request.package.clone(),
                bin: request.bin.clone(),
                base_path: base_path.clone(),
                source,
            })?;

        debug!(
            command = %name,
            bin = %bin_path.display(),
            args = ?request.args,
            "Spawning process"
        );

        // Build command
        let mut cmd = Command::new(&bin_path);
        if !request.command.is_empty() {
            cmd.arg(&request.command);
        }
        cmd.args(&request.args).current_dir(&cwd);

        self.env.apply(&mut cmd);
        cmd.envs(&request.env);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so the whole tree can be signalled
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            error!(command = %name, bin = %bin_path.display(), error = %e, "Failed to spawn process");
            ProcessError::SpawnFailed(e)
        })?;
        let pid = child.id().ok_or_else(|| {
            ProcessError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Failed to get process ID",
            ))
        })?;

        let readiness = Arc::new(Completion::new());
        readiness.resolve(pid);
        info!(
            command = %name,
            bin = %bin_path.display(),
            pid = %pid,
            cwd = %cwd.display(),
            "Process running"
        );

        let dispatcher = Arc::new(OutputDispatcher::new());
        let lifecycle = Arc::new(LifecycleTracker::new(name.clone()));
        let escalator = Arc::new(TerminationEscalator::new(
            name.clone(),
            Arc::clone(&readiness),
            Arc::clone(&lifecycle),
            Arc::clone(&dispatcher),
            Arc::clone(&self.signaller),
            self.settings.termination_policy(),
        ));

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let identity = ProcessIdentity {
            package: request.package,
            bin: request.bin,
            command: request.command,
            args: request.args,
            cwd,
            bin_path,
        };
        let process = ManagedProcess::new(
            identity,
            name.clone(),
            readiness,
            Arc::clone(&dispatcher),
            Arc::clone(&lifecycle),
            escalator,
            stdin,
        );

        setup(&process);

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = stdout {
            pumps.push(spawn_pump(stdout, Arc::clone(&dispatcher), name.clone()));
        }
        if let Some(stderr) = stderr {
            pumps.push(spawn_pump(stderr, Arc::clone(&dispatcher), name.clone()));
        }

        tokio::spawn(monitor_exit(
            child,
            pid,
            pumps,
            lifecycle,
            self.settings.drain_timeout(),
        ));

        Ok(process)
    }
}

impl std::fmt::Debug for ProcessLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLauncher")
            .field("env", &self.env)
            .field("settings", &self.settings)
            .field("signaller", &self.signaller)
            .finish_non_exhaustive()
    }
}

/// Forward every read from `stream` to the dispatcher until EOF
fn spawn_pump<R>(mut stream: R, dispatcher: Arc<OutputDispatcher>, name: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    debug!(command = %name, "{}", String::from_utf8_lossy(&buf[..n]).trim_end());
                    dispatcher.dispatch(&buf[..n]);
                }
                Err(e) => {
                    warn!(command = %name, error = %e, "Failed to read process output");
                    break;
                }
            }
        }
    })
}

/// Reap the child, let trailing output drain, then record the outcome
async fn monitor_exit(
    mut child: Child,
    pid: u32,
    pumps: Vec<JoinHandle<()>>,
    lifecycle: Arc<LifecycleTracker>,
    drain_timeout: Duration,
) {
    let code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(pid = %pid, error = %e, "Error waiting for process");
            None
        }
    };

    // Descendants may keep the pipes open; do not wait on them forever
    let drained = tokio::time::timeout(drain_timeout, async {
        for pump in pumps {
            let _ = pump.await;
        }
    })
    .await;
    if drained.is_err() {
        debug!(pid = %pid, "Output still open after exit, not waiting for it");
    }

    lifecycle.on_exit(pid, code);
}

//! Signal delivery to process trees and liveness checks
//!
//! - Unix: the child leads its own process group, so the whole tree is
//!   signalled through `killpg` (SIGTERM, then SIGKILL)
//! - Windows: `taskkill /t`, with `/f` for the forceful step

use std::fmt;
use std::io;

/// Delivers termination signals and observes liveness
pub trait ProcessSignaller: Send + Sync + fmt::Debug {
    /// Ask the process tree rooted at `pid` to shut down
    fn terminate_tree(&self, pid: u32) -> io::Result<()>;

    /// Unconditionally kill the process tree rooted at `pid`
    fn kill_tree(&self, pid: u32) -> io::Result<()>;

    /// Whether `pid` still names a live OS process
    fn is_running(&self, pid: u32) -> bool;
}

/// Signaller backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignaller;

#[cfg(unix)]
mod imp {
    use std::io;

    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;
    use tracing::{debug, warn};

    pub(super) fn signal_tree(pid: u32, signal: Signal) -> io::Result<()> {
        let target = Pid::from_raw(pid as i32);
        match killpg(target, signal) {
            Ok(()) => {
                debug!(pid = %pid, signal = ?signal, "Sent signal to process group");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pid = %pid, "Process group already gone");
                Ok(())
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to signal process group, trying process only");
                match kill(target, signal) {
                    Ok(()) | Err(Errno::ESRCH) => Ok(()),
                    Err(e) => Err(io::Error::from(e)),
                }
            }
        }
    }

    pub(super) fn is_running(pid: u32) -> bool {
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => true,
            // Exists but owned by someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    pub(super) fn terminate(pid: u32) -> io::Result<()> {
        signal_tree(pid, Signal::SIGTERM)
    }

    pub(super) fn force(pid: u32) -> io::Result<()> {
        signal_tree(pid, Signal::SIGKILL)
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use std::process::{Command, Stdio};

    use tracing::debug;

    fn taskkill(pid: u32, force: bool) -> io::Result<()> {
        let pid_arg = pid.to_string();
        let mut args = vec!["/pid", pid_arg.as_str(), "/t"];
        if force {
            args.push("/f");
        }
        Command::new("taskkill")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(pid = %pid, force, "Requested taskkill");
        Ok(())
    }

    pub(super) fn is_running(pid: u32) -> bool {
        let mut system = sysinfo::System::new();
        system.refresh_process(sysinfo::Pid::from_u32(pid))
    }

    pub(super) fn terminate(pid: u32) -> io::Result<()> {
        taskkill(pid, false)
    }

    pub(super) fn force(pid: u32) -> io::Result<()> {
        taskkill(pid, true)
    }
}

impl ProcessSignaller for OsSignaller {
    fn terminate_tree(&self, pid: u32) -> io::Result<()> {
        imp::terminate(pid)
    }

    fn kill_tree(&self, pid: u32) -> io::Result<()> {
        imp::force(pid)
    }

    fn is_running(&self, pid: u32) -> bool {
        pid != 0 && imp::is_running(pid)
    }
}

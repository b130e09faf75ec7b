//! Launch request and termination policy

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Liveness poll interval used while a kill is in flight
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time a process gets to exit after the graceful signal before it is killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(5000);

/// Bounds applied to the poll interval by [`TerminationPolicy::clamped`]
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Describes one tool invocation: which package bin to run and how
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Package that ships the executable
    pub package: String,
    /// Executable name inside the package
    pub bin: String,
    /// Sub-command passed as the first argument
    pub command: String,
    /// Arguments following the sub-command
    pub args: Vec<String>,
    /// Working directory (None = launcher root path)
    pub cwd: Option<PathBuf>,
    /// Where the package is installed (None = launcher root path)
    pub base_path: Option<PathBuf>,
    /// Extra environment variables for this invocation only
    pub env: BTreeMap<String, String>,
}

impl LaunchRequest {
    /// Create a new launch request
    pub fn new(
        package: impl Into<String>,
        bin: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            bin: bin.into(),
            command: command.into(),
            args: vec![],
            cwd: None,
            base_path: None,
            env: BTreeMap::new(),
        }
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set the directory the package is resolved from
    pub fn base_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_path = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Human readable name used in logs and failure messages
    pub fn display_name(&self) -> String {
        let mut name = format!("{} {}", self.package, self.command);
        for arg in &self.args {
            name.push(' ');
            name.push_str(arg);
        }
        name
    }
}

/// Timing of the graceful-then-forceful kill sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// How often liveness is checked after the graceful signal
    pub poll_interval: Duration,
    /// How long to wait before sending the forceful signal
    pub grace_period: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl TerminationPolicy {
    /// Poll interval forced into `MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL`
    pub fn clamped(self) -> Self {
        Self {
            poll_interval: self
                .poll_interval
                .clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
            grace_period: self.grace_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_joins_args() {
        let request = LaunchRequest::new("@dcl/sdk-commands", "sdk-commands", "start")
            .args(["--port", "3000"]);
        assert_eq!(
            request.display_name(),
            "@dcl/sdk-commands start --port 3000"
        );
    }

    #[test]
    fn test_default_policy() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_millis(100));
        assert_eq!(policy.grace_period, Duration::from_secs(5));
    }

    #[test]
    fn test_clamped_policy_bounds_poll_interval() {
        let zero = TerminationPolicy {
            poll_interval: Duration::ZERO,
            grace_period: Duration::from_secs(1),
        }
        .clamped();
        assert_eq!(zero.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(zero.grace_period, Duration::from_secs(1));

        let huge = TerminationPolicy {
            poll_interval: Duration::MAX,
            grace_period: Duration::MAX,
        }
        .clamped();
        assert_eq!(huge.poll_interval, MAX_POLL_INTERVAL);
        assert_eq!(huge.grace_period, Duration::MAX);

        assert_eq!(TerminationPolicy::default().clamped(), TerminationPolicy::default());
    }
}

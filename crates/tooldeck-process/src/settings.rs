//! Launcher settings loaded from file and environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::config::{TerminationPolicy, MAX_POLL_INTERVAL};
use crate::error::{ProcessError, Result};

/// Environment variable prefix, e.g. `TOOLDECK_GRACE_PERIOD_MS`
pub const ENV_PREFIX: &str = "TOOLDECK";

/// Settings shared by every launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Host root: default working directory and package base path
    pub root_path: PathBuf,
    /// Liveness poll interval during a kill
    pub poll_interval_ms: u64,
    /// Grace period before the forceful signal
    pub grace_period_ms: u64,
    /// How long exit handling waits for trailing output
    pub drain_timeout_ms: u64,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            root_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            poll_interval_ms: 100,
            grace_period_ms: 5000,
            drain_timeout_ms: 250,
        }
    }
}

impl LauncherSettings {
    /// Load settings: defaults, then `path` (if given), then `TOOLDECK_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings rooted at `root_path` with default timings
    pub fn with_root(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ProcessError::InvalidConfig(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if u128::from(self.poll_interval_ms) > MAX_POLL_INTERVAL.as_millis() {
            return Err(ProcessError::InvalidConfig(format!(
                "poll_interval_ms must not exceed {}",
                MAX_POLL_INTERVAL.as_millis()
            )));
        }
        if self.grace_period_ms < self.poll_interval_ms {
            return Err(ProcessError::InvalidConfig(
                "grace_period_ms must not be shorter than poll_interval_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

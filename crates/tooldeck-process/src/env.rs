//! Environment handed to launched tools

use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use tokio::process::Command;

use crate::error::{ProcessError, Result};

/// Environment composed once by the host and threaded into every launch
///
/// Children inherit the host environment; `PATH` is replaced by the augmented
/// value when one is set.
#[derive(Debug, Clone, Default)]
pub struct LaunchEnv {
    path: Option<OsString>,
    vars: BTreeMap<String, String>,
}

impl LaunchEnv {
    /// Inherit the host environment unchanged
    pub fn inherit() -> Self {
        Self::default()
    }

    /// Use `path` as the children's `PATH`
    pub fn with_path(path: impl Into<OsString>) -> Self {
        Self {
            path: Some(path.into()),
            vars: BTreeMap::new(),
        }
    }

    /// Append `dirs` to the host's current `PATH`
    pub fn with_extra_paths<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let current = env::var_os("PATH").unwrap_or_default();
        Self::join(&current, dirs)
    }

    fn join<I, P>(base: &OsStr, dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut entries: Vec<PathBuf> = env::split_paths(base)
            .filter(|entry| !entry.as_os_str().is_empty())
            .collect();
        entries.extend(dirs.into_iter().map(Into::into));
        let path = env::join_paths(entries)
            .map_err(|e| ProcessError::InvalidConfig(format!("Invalid PATH entry: {e}")))?;
        Ok(Self::with_path(path))
    }

    /// Add a variable set on every child
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// The `PATH` override, if any
    pub fn path(&self) -> Option<&OsStr> {
        self.path.as_deref()
    }

    pub(crate) fn apply(&self, cmd: &mut Command) {
        cmd.envs(&self.vars);
        if let Some(path) = &self.path {
            cmd.env("PATH", path);
        }
    }
}

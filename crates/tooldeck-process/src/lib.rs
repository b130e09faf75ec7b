//! # tooldeck-process
//!
//! **Purpose**: Launch, observe and tear down long-running tool processes
//! (preview servers, deploy servers, one-shot tool commands) for a host
//! application.
//!
//! ## Features
//!
//! - **Process Launching**: Resolve a package bin, compose the environment,
//!   spawn with piped output in its own process group
//! - **Output Matching**: Multicast regex matchers over output chunks, with
//!   one-shot matchers and a `wait_for` handshake
//! - **Exit Tracking**: A single immutable completion outcome shared by every
//!   waiter
//! - **Tree Kill**: Graceful signal, 100 ms liveness poll, forceful signal
//!   after 5 s; idempotent under concurrent callers
//! - **Slots**: Keep at most one server per role running
//!
//! Output is matched per chunk as read from the pipe, not per line. A pattern
//! whose text is split across two reads will not match.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use regex::Regex;
//! use tooldeck_process::{CompletionOutcome, LaunchEnv, LaunchRequest, LauncherSettings, ProcessLauncher};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = |_pkg: &str, bin: &str, base: &Path| -> std::io::Result<PathBuf> {
//!     Ok(base.join("node_modules").join(".bin").join(bin))
//! };
//! let launcher = ProcessLauncher::new(
//!     resolver,
//!     LaunchEnv::with_extra_paths(["/opt/host/bin"])?,
//!     LauncherSettings::with_root("/srv/project"),
//! );
//!
//! let build = launcher.launch(LaunchRequest::new("@dcl/sdk-commands", "sdk-commands", "build"))?;
//! build.on(Regex::new("(?i)warning")?, |text| eprintln!("{text}"))?;
//!
//! if let CompletionOutcome::Failure(message) = build.wait().await {
//!     eprintln!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod escalator;
pub mod host;
pub mod launcher;
pub mod lifecycle;
pub mod outcome;
pub mod settings;
pub mod signal;
pub mod slot;

pub use child::{ManagedProcess, ProcessIdentity};
pub use completion::Completion;
pub use config::{LaunchRequest, TerminationPolicy};
pub use dispatch::OutputDispatcher;
pub use env::LaunchEnv;
pub use error::{ProcessError, Result};
pub use escalator::TerminationEscalator;
pub use host::{BinaryResolver, PortAllocator};
pub use launcher::ProcessLauncher;
pub use lifecycle::LifecycleTracker;
pub use outcome::CompletionOutcome;
pub use settings::LauncherSettings;
pub use signal::{OsSignaller, ProcessSignaller};
pub use slot::ProcessSlot;

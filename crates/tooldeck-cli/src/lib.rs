//! # tooldeck
//!
//! Command line host for `tooldeck-process`: resolves package bins from a
//! project's `node_modules`, runs them as supervised processes and maps the
//! completion outcome onto the exit code.

pub mod args;
pub mod error;
pub mod host;
pub mod logging;
pub mod run;

pub use error::{CliError, CliResult};

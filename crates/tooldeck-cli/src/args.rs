//! Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tooldeck", version, about = "Run package tools as supervised processes")]
pub struct Cli {
    /// Settings file (TOML); TOOLDECK_* variables override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch a package bin and supervise it until it exits
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Package providing the executable
    pub package: String,

    /// Executable name inside the package
    pub bin: String,

    /// Sub-command passed to the executable
    pub command: String,

    /// Arguments for the sub-command; `{port}` is replaced when --port is set
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Working directory (defaults to the configured root path)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Directory holding node_modules (defaults to the configured root path)
    #[arg(long)]
    pub base_path: Option<PathBuf>,

    /// Directory appended to PATH for the tool (repeatable)
    #[arg(long = "path", value_name = "DIR")]
    pub extra_paths: Vec<PathBuf>,

    /// Regex that marks the tool as ready
    #[arg(long, value_name = "REGEX")]
    pub wait_for: Option<String>,

    /// Regex that marks startup as failed
    #[arg(long, value_name = "REGEX", requires = "wait_for")]
    pub reject: Option<String>,

    /// Allocate a free TCP port and substitute it for `{port}`
    #[arg(long)]
    pub port: bool,

    /// Do not echo tool output
    #[arg(long, short)]
    pub quiet: bool,
}

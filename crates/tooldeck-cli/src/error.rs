//! CLI error type

use thiserror::Error;
use tooldeck_process::ProcessError;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted")]
    Interrupted,
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::Process(ProcessError::ResolveFailed { bin, .. }) => format!(
                "{self}\n\nInstall the package or pass --base-path pointing at the directory that holds node_modules/.bin/{bin}."
            ),
            CliError::Process(ProcessError::Settings(_)) => {
                format!("{self}\n\nCheck the file passed with --config and any TOOLDECK_* variables.")
            }
            CliError::Pattern(e) => format!("Invalid --wait-for/--reject pattern: {e}"),
            _ => self.to_string(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Interrupted => 130,
            CliError::Process(ProcessError::NonZeroExit(_)) => 1,
            CliError::Process(ProcessError::PatternRejected(_)) => 3,
            _ => 2,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

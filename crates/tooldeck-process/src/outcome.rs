//! Completion outcome of a managed process

use std::fmt;

use crate::error::{ProcessError, Result};

/// How a managed process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Exit code 0, or terminated by a signal
    Success,
    /// Non-zero exit code; the message names the process, pid and code
    Failure(String),
}

impl CompletionOutcome {
    /// Derive the outcome from an exit code (`None` = killed by signal)
    pub fn from_exit(name: &str, pid: u32, code: Option<i32>) -> Self {
        match code {
            None | Some(0) => Self::Success,
            Some(code) => Self::Failure(format!(
                "process \"{name}\" with pid={pid} exited with code={code}"
            )),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Convert into a `Result`, mapping failures to [`ProcessError::NonZeroExit`]
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Failure(message) => Err(ProcessError::NonZeroExit(message)),
        }
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(message) => write!(f, "failure: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_signal_are_success() {
        assert_eq!(
            CompletionOutcome::from_exit("tool start", 42, Some(0)),
            CompletionOutcome::Success
        );
        assert_eq!(
            CompletionOutcome::from_exit("tool start", 42, None),
            CompletionOutcome::Success
        );
    }

    #[test]
    fn test_non_zero_is_failure() {
        let outcome = CompletionOutcome::from_exit("tool build", 4242, Some(7));
        match &outcome {
            CompletionOutcome::Failure(message) => {
                assert!(message.contains("tool build"));
                assert!(message.contains("pid=4242"));
                assert!(message.contains("code=7"));
            }
            CompletionOutcome::Success => panic!("Expected failure outcome"),
        }
        assert!(matches!(
            outcome.into_result(),
            Err(ProcessError::NonZeroExit(_))
        ));
    }
}

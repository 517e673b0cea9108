//! Error types for CLI commands

use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// One or more tools failed during install or upgrade
    #[error("{failed} of {total} tools failed")]
    InstallFailed {
        /// Number of tools that failed
        failed: usize,
        /// Number of tools processed
        total: usize,
    },

    /// `reset` was given neither tools nor `--all`
    #[error("Nothing to reset: name one or more tools or pass --all")]
    NothingToReset,

    /// Engine, config or state error
    #[error(transparent)]
    Core(#[from] miseseq_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_install_failed_message() {
        let err = CommandError::InstallFailed {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 tools failed");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: CommandError = miseseq_core::Error::DependencyCycle {
            tools: vec!["a".to_string(), "b".to_string()],
        }
        .into();
        assert_eq!(err.to_string(), "dependency cycle detected among: a, b");
    }
}

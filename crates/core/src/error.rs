//! Base error types for mise-seq
//!
//! This module provides the foundation error types that all crates can use.
//! Variants follow the failure classes of an installation run: configuration
//! and graph errors abort before anything is mutated, hook and installer
//! errors are attributed to a single tool.

use std::time::Duration;
use thiserror::Error;

/// Base error type for shared functionality
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A dependency reference names a tool that is not declared
    #[error("tool '{tool}' depends on unknown tool '{dependency}'")]
    UnknownDependency {
        /// The dependent tool
        tool: String,
        /// The missing dependency name
        dependency: String,
    },

    /// The dependency graph has no valid order
    #[error("dependency cycle detected among: {}", tools.join(", "))]
    DependencyCycle {
        /// Tools whose in-degree never reached zero
        tools: Vec<String>,
    },

    /// A tool name was referenced (explicit order, CLI filter) but never declared
    #[error("unknown tool '{name}' referenced by {context}")]
    UnknownTool {
        /// The undeclared name
        name: String,
        /// Where the reference came from
        context: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hook execution error
    #[error("Hook execution error: {0}")]
    HookExecution(String),

    /// Hook exceeded its time budget
    #[error("{phase} hook for '{tool}' timed out after {}s", timeout.as_secs())]
    HookTimeout {
        /// Tool the hook belongs to
        tool: String,
        /// Hook phase name
        phase: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// External installer error
    #[error("Installer error: {0}")]
    Installer(String),

    /// State persistence error
    #[error("State error: {0}")]
    State(String),

    /// The run was interrupted
    #[error("operation cancelled")]
    Cancelled,

    /// Generic error message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Whether this error must stop the whole run rather than a single tool
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownDependency { .. }
                | Self::DependencyCycle { .. }
                | Self::UnknownTool { .. }
                | Self::Config(_)
                | Self::Cancelled
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

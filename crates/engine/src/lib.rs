//! # mise-seq engine
//!
//! Installation engine for mise-seq.
//!
//! - **Resolver**: dependency-aware installation order (Kahn's algorithm)
//! - **Hooks**: fingerprint state store and hook runner with dry-run, force and timeout
//! - **Process**: bounded, cancellable child processes with captured output
//! - **Installer**: client for the external version manager
//! - **Orchestrator**: per-tool install/upgrade flow with hook phases

pub mod hooks;
pub mod installer;
pub mod orchestrator;
pub mod process;
pub mod resolver;

// Re-export error types from core
pub use miseseq_core::{Error, Result};

// Re-export commonly used types
pub use hooks::{HookBatch, HookFailure, HookResult, HookRunner, HookStateStore, ShouldRun};
pub use installer::{InstalledTool, MiseCli, ToolInstaller};
pub use orchestrator::{
    FailurePolicy, InstallReport, Orchestrator, ToolAction, ToolOutcome, ToolStatus,
};
pub use process::{CancelFlag, Completion, ProcessOutput};
pub use resolver::{install_order, resolve};

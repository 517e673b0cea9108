//! Hook system for tool installation
//!
//! Hooks are shell scripts bound to a tool and a phase (preinstall or
//! postinstall). A script runs only when its fingerprint differs from the one
//! recorded after its last successful run, unless forced.
//!
//! ## Module Organization
//!
//! - `filter`: applicability filtering by `when` condition
//! - `state`: fingerprint records per (tool, phase)
//! - `executor`: hook execution with dry-run, timeout and output capture

pub mod executor;
pub mod filter;
pub mod state;

// Re-export main types for convenience
pub use executor::{HookBatch, HookFailure, HookResult, HookRunner, HookRunnerBuilder};
pub use filter::applicable;
pub use state::{HookStateStore, RunReason, ShouldRun, fingerprint};

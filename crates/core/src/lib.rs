//! Core types and utilities for mise-seq
//!
//! This is the foundation crate (Layer 0) that all other mise-seq crates depend on.
//! It provides:
//! - Base error types
//! - Tool references (`name` / `name@version`)
//! - Hook phases and applicability conditions
//!
//! This crate has no dependencies on other mise-seq crates.

pub mod error;
pub mod phase;
pub mod tool;

pub use error::{Error, Result};
pub use phase::{HookPhase, When};
pub use tool::{LATEST, ToolRef};

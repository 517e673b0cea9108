//! Configuration management for mise-seq
//!
//! This crate handles:
//! - Tool configuration loading (JSON, YAML, TOML) and validation
//! - Runtime settings read from the environment
//! - XDG directory management
//! - Logging initialization

pub mod config;
pub mod dirs;
pub mod logging;
pub mod runtime;

// Re-export error types from core
pub use miseseq_core::{Error, Result};

// Re-export main types
pub use config::{
    Config, ConfigFormat, DEFAULTS_KEY, Defaults, HookDefinition, NpmSettings, SettingValue,
    Settings, ToolSpec,
};
pub use dirs::{cache_dir, default_state_dir};
pub use runtime::RuntimeConfig;

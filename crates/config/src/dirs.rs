//! XDG directory utilities
//!
//! This module provides XDG-compliant directory paths for mise-seq.
//! It follows the XDG Base Directory specification using the `xdg` crate:
//! - `XDG_CACHE_HOME` defaults to ~/.cache

use std::path::PathBuf;
use xdg::BaseDirectories;

/// Application prefix used for every XDG directory
pub const APP_NAME: &str = "mise-seq";

/// Get the mise-seq cache directory
///
/// Returns `$XDG_CACHE_HOME/mise-seq` or `~/.cache/mise-seq`
#[must_use]
pub fn cache_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(APP_NAME).get_cache_home()
}

/// Get the default hook state directory
///
/// Returns `$XDG_CACHE_HOME/mise-seq/state` or `~/.cache/mise-seq/state`
#[must_use]
pub fn default_state_dir() -> Option<PathBuf> {
    cache_dir().map(|d| d.join("state"))
}

//! Runtime settings
//!
//! Settings that control how a run behaves rather than what it installs.
//! They are read once from the environment at process start and then passed
//! explicitly to every component; the process environment is never modified.

use crate::Result;
use crate::dirs::APP_NAME;
use miseseq_core::Error;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default hook timeout (5 minutes)
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default installer invocation timeout (10 minutes)
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Describe actions without executing them
    pub dry_run: bool,
    /// Verbose output
    pub debug: bool,
    /// Run hooks even when their fingerprint is unchanged
    pub force_hooks: bool,
    /// Re-run unchanged postinstall hooks after an upgrade
    pub run_postinstall_on_update: bool,
    /// Root of the hook state store
    pub state_dir: PathBuf,
    /// Upper bound for a single hook script
    pub hook_timeout: Duration,
    /// Upper bound for a single installer invocation
    pub install_timeout: Duration,
    /// Custom shims directory, searched first
    pub mise_shims_custom: Option<PathBuf>,
    /// Installer shims directory
    pub mise_shims_default: Option<PathBuf>,
    /// PATH inherited from the parent process
    pub inherited_path: Option<OsString>,
}

impl RuntimeConfig {
    /// Settings with defaults and the given state directory
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dry_run: false,
            debug: false,
            force_hooks: false,
            run_postinstall_on_update: false,
            state_dir: state_dir.into(),
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            mise_shims_custom: None,
            mise_shims_default: None,
            inherited_path: None,
        }
    }

    /// Read settings from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout is not a positive number of seconds, or
    /// if no state directory is configured and none can be derived
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Read settings through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// See [`RuntimeConfig::from_env`]
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.to_string_lossy().into_owned())
                .filter(|v| !v.is_empty())
        };
        let looked_up_home = text("HOME").map(PathBuf::from);
        let home = looked_up_home.clone().or_else(dirs::home_dir);

        // Relative XDG paths are invalid and ignored
        let state_dir = match text("STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => text("XDG_CACHE_HOME")
                .map(PathBuf::from)
                .filter(|p| p.is_absolute())
                .or_else(|| looked_up_home.map(|h| h.join(".cache")))
                .map(|cache| cache.join(APP_NAME).join("state"))
                .or_else(crate::dirs::default_state_dir)
                .ok_or_else(|| {
                    Error::Config(
                        "Cannot determine state directory; set STATE_DIR or XDG_CACHE_HOME"
                            .to_string(),
                    )
                })?,
        };

        let mise_shims_default = text("MISE_SHIMS_DEFAULT")
            .map(PathBuf::from)
            .or_else(|| {
                text("MISE_DATA_DIR")
                    .map(PathBuf::from)
                    .or_else(|| home.as_ref().map(|h| h.join(".local/share/mise")))
                    .map(|data| data.join("shims"))
            });

        Ok(Self {
            dry_run: is_flag_set(text("DRY_RUN").as_deref()),
            debug: is_flag_set(text("DEBUG").as_deref()),
            force_hooks: is_flag_set(text("FORCE_HOOKS").as_deref()),
            run_postinstall_on_update: is_flag_set(text("RUN_POSTINSTALL_ON_UPDATE").as_deref()),
            state_dir,
            hook_timeout: parse_timeout("HOOK_TIMEOUT", text("HOOK_TIMEOUT"), DEFAULT_HOOK_TIMEOUT)?,
            install_timeout: parse_timeout(
                "INSTALL_TIMEOUT",
                text("INSTALL_TIMEOUT"),
                DEFAULT_INSTALL_TIMEOUT,
            )?,
            mise_shims_custom: text("MISE_SHIMS_CUSTOM").map(PathBuf::from),
            mise_shims_default,
            inherited_path: lookup("PATH").filter(|p| !p.is_empty()),
        })
    }

    /// PATH handed to child processes: custom shims, default shims, then the inherited PATH
    ///
    /// Shim directories that do not exist yet are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a shim path exists but is not a directory
    pub fn search_path(&self) -> Result<OsString> {
        let mut entries: Vec<PathBuf> = Vec::new();

        for (var, dir) in [
            ("MISE_SHIMS_CUSTOM", &self.mise_shims_custom),
            ("MISE_SHIMS_DEFAULT", &self.mise_shims_default),
        ] {
            if let Some(dir) = dir {
                check_dir(var, dir)?;
                entries.push(dir.clone());
            }
        }

        if let Some(path) = &self.inherited_path {
            entries.extend(std::env::split_paths(path));
        }

        std::env::join_paths(entries)
            .map_err(|e| Error::Config(format!("Cannot build PATH for child processes: {e}")))
    }
}

/// A flag is set when non-empty and not an explicit negative
fn is_flag_set(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !matches!(
            v.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
    }
}

fn parse_timeout(var: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{var} must be a positive number of seconds, got '{value}'"
        ))),
    }
}

fn check_dir(var: &str, dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => Err(Error::Config(format!(
            "{var} invalid: not a directory: {}",
            dir.display()
        ))),
        _ => Ok(()),
    }
}

//! Hook fingerprint state
//!
//! Records the SHA256 fingerprint of the last successfully executed script per
//! (tool, phase), as `<root>/<tool>/<phase>.sha256` holding the hex digest.

use miseseq_core::{Error, HookPhase, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;

/// Compute the fingerprint of a script
///
/// The exact text is hashed; whitespace is significant.
#[must_use]
pub fn fingerprint(script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    hex::encode(hasher.finalize())
}

/// Why a hook will or will not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    /// Force mode is on
    Forced,
    /// Nothing recorded for this tool and phase
    NoRecord,
    /// The script changed since it last ran
    Changed,
    /// Unchanged postinstall hook re-run after an update
    PostinstallOnUpdate,
    /// Unchanged; skip
    Unchanged,
}

impl RunReason {
    /// Short description for logs and reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forced => "forced",
            Self::NoRecord => "first run",
            Self::Changed => "script changed",
            Self::PostinstallOnUpdate => "postinstall on update",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Outcome of [`HookStateStore::should_run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShouldRun {
    /// Whether the script must be executed
    pub run: bool,
    /// Fingerprint recorded by the previous successful run
    pub previous: Option<String>,
    /// Fingerprint of the script being considered
    pub current: String,
    /// Which rule decided
    pub reason: RunReason,
}

/// File-backed store of hook fingerprints
#[derive(Debug, Clone)]
pub struct HookStateStore {
    root: PathBuf,
    force: bool,
    run_postinstall_on_update: bool,
}

impl HookStateStore {
    /// Create a store rooted at `root`; nothing is created until the first save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            force: false,
            run_postinstall_on_update: false,
        }
    }

    /// Always report that hooks must run
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Re-run unchanged postinstall hooks
    #[must_use]
    pub fn with_postinstall_on_update(mut self, enabled: bool) -> Self {
        self.run_postinstall_on_update = enabled;
        self
    }

    /// State root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether force mode is on
    #[must_use]
    pub fn force(&self) -> bool {
        self.force
    }

    /// Path of the record for (tool, phase)
    ///
    /// # Errors
    ///
    /// Returns an error if the tool name is not a single safe path segment
    pub fn record_path(&self, tool: &str, phase: HookPhase) -> Result<PathBuf> {
        Ok(self.tool_dir(tool)?.join(phase.state_file_name()))
    }

    fn tool_dir(&self, tool: &str) -> Result<PathBuf> {
        if tool.is_empty()
            || tool == "."
            || tool == ".."
            || tool.contains('/')
            || tool.contains('\\')
        {
            return Err(Error::State(format!(
                "Invalid tool name for state record: '{tool}'"
            )));
        }
        Ok(self.root.join(tool))
    }

    /// Read the recorded fingerprint for (tool, phase)
    ///
    /// A missing record is `None`; any other read failure is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read
    pub fn record(&self, tool: &str, phase: HookPhase) -> Result<Option<String>> {
        let path = self.record_path(tool, phase)?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                let digest = content.trim();
                Ok((!digest.is_empty()).then(|| digest.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::State(format!(
                "Failed to read hook state {}: {e}",
                path.display()
            ))),
        }
    }

    /// Decide whether `script` must run for (tool, phase)
    ///
    /// # Errors
    ///
    /// Returns an error if the existing record cannot be read
    #[tracing::instrument(skip(self, script))]
    pub fn should_run(&self, tool: &str, phase: HookPhase, script: &str) -> Result<ShouldRun> {
        let current = fingerprint(script);
        let previous = self.record(tool, phase)?;

        let (run, reason) = if self.force {
            (true, RunReason::Forced)
        } else {
            match &previous {
                None => (true, RunReason::NoRecord),
                Some(prev) if !bool::from(prev.as_bytes().ct_eq(current.as_bytes())) => {
                    (true, RunReason::Changed)
                }
                Some(_) if phase == HookPhase::Postinstall && self.run_postinstall_on_update => {
                    (true, RunReason::PostinstallOnUpdate)
                }
                Some(_) => (false, RunReason::Unchanged),
            }
        };

        tracing::debug!(run, reason = reason.as_str(), "Hook state decision");

        Ok(ShouldRun {
            run,
            previous,
            current,
            reason,
        })
    }

    /// Record `script` as the last executed script for (tool, phase)
    ///
    /// The record is replaced atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written
    pub fn save(&self, tool: &str, phase: HookPhase, script: &str) -> Result<()> {
        let dir = self.tool_dir(tool)?;
        let path = dir.join(phase.state_file_name());
        let state_err = |e: io::Error| {
            Error::State(format!(
                "Failed to write hook state {}: {e}",
                path.display()
            ))
        };

        fs::create_dir_all(&dir).map_err(state_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(state_err)?;
        tmp.write_all(fingerprint(script).as_bytes())
            .map_err(state_err)?;
        tmp.persist(&path).map_err(|e| state_err(e.error))?;

        tracing::debug!(tool, phase = %phase, "Saved hook state");
        Ok(())
    }

    /// Remove all records for one tool
    ///
    /// # Errors
    ///
    /// Returns an error if the records exist but cannot be removed
    pub fn clear(&self, tool: &str) -> Result<()> {
        let dir = self.tool_dir(tool)?;
        remove_dir_if_exists(&dir)
    }

    /// Remove every record
    ///
    /// # Errors
    ///
    /// Returns an error if the state root exists but cannot be removed
    pub fn clear_all(&self) -> Result<()> {
        remove_dir_if_exists(&self.root)
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::State(format!(
            "Failed to remove hook state {}: {e}",
            dir.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> HookStateStore {
        HookStateStore::new(temp.path().join("state"))
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint("echo hello");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_whitespace_is_significant() {
        assert_ne!(fingerprint("echo hi"), fingerprint("echo hi "));
    }

    #[test]
    fn test_no_record_runs() {
        let temp = TempDir::new().unwrap();
        let decision = store(&temp)
            .should_run("jq", HookPhase::Preinstall, "echo hi")
            .unwrap();
        assert!(decision.run);
        assert_eq!(decision.reason, RunReason::NoRecord);
        assert!(decision.previous.is_none());
    }

    #[test]
    fn test_save_then_unchanged_skips() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save("jq", HookPhase::Preinstall, "echo hi").unwrap();

        let first = store.should_run("jq", HookPhase::Preinstall, "echo hi").unwrap();
        let second = store.should_run("jq", HookPhase::Preinstall, "echo hi").unwrap();
        assert!(!first.run);
        assert!(!second.run);
        assert_eq!(second.reason, RunReason::Unchanged);
        assert_eq!(second.previous.as_deref(), Some(fingerprint("echo hi").as_str()));
    }

    #[test]
    fn test_single_character_change_runs() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save("jq", HookPhase::Postinstall, "echo hi").unwrap();

        let decision = store
            .should_run("jq", HookPhase::Postinstall, "echo ho")
            .unwrap();
        assert!(decision.run);
        assert_eq!(decision.reason, RunReason::Changed);
    }

    #[test]
    fn test_force_always_runs() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).with_force(true);
        store.save("jq", HookPhase::Preinstall, "echo hi").unwrap();

        let decision = store.should_run("jq", HookPhase::Preinstall, "echo hi").unwrap();
        assert!(decision.run);
        assert_eq!(decision.reason, RunReason::Forced);
    }

    #[test]
    fn test_postinstall_on_update_only_affects_postinstall() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).with_postinstall_on_update(true);
        store.save("jq", HookPhase::Preinstall, "a").unwrap();
        store.save("jq", HookPhase::Postinstall, "b").unwrap();

        assert!(!store.should_run("jq", HookPhase::Preinstall, "a").unwrap().run);
        let post = store.should_run("jq", HookPhase::Postinstall, "b").unwrap();
        assert!(post.run);
        assert_eq!(post.reason, RunReason::PostinstallOnUpdate);
    }

    #[test]
    fn test_phases_are_independent() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save("jq", HookPhase::Preinstall, "same").unwrap();
        assert!(store.should_run("jq", HookPhase::Postinstall, "same").unwrap().run);
    }

    #[test]
    fn test_record_layout() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save("fzf", HookPhase::Postinstall, "echo done").unwrap();

        let path = temp.path().join("state/fzf/postinstall.sha256");
        assert_eq!(fs::read_to_string(path).unwrap(), fingerprint("echo done"));
    }

    #[test]
    fn test_record_with_trailing_newline_is_accepted() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let dir = temp.path().join("state/fzf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("preinstall.sha256"), format!("{}\n", fingerprint("x"))).unwrap();

        assert!(!store.should_run("fzf", HookPhase::Preinstall, "x").unwrap().run);
    }

    #[test]
    fn test_unreadable_record_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        // A directory where the record file should be
        fs::create_dir_all(temp.path().join("state/fzf/preinstall.sha256")).unwrap();

        let err = store.should_run("fzf", HookPhase::Preinstall, "x").unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[test]
    fn test_clear_and_clear_all() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save("a", HookPhase::Preinstall, "x").unwrap();
        store.save("b", HookPhase::Preinstall, "x").unwrap();

        store.clear("a").unwrap();
        assert!(store.record("a", HookPhase::Preinstall).unwrap().is_none());
        assert!(store.record("b", HookPhase::Preinstall).unwrap().is_some());

        store.clear_all().unwrap();
        assert!(store.record("b", HookPhase::Preinstall).unwrap().is_none());
        assert!(!temp.path().join("state").exists());

        // Clearing missing state is not an error
        store.clear("a").unwrap();
        store.clear_all().unwrap();
    }

    #[test]
    fn test_rejects_path_like_tool_names() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(store.save("../escape", HookPhase::Preinstall, "x").is_err());
        assert!(store.clear("..").is_err());
    }
}

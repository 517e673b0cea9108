//! Reset command implementation
//!
//! Forgets recorded hook fingerprints so the affected hooks run again on the
//! next install. Works without a configuration file.

use clap::Args;
use miseseq_engine::HookStateStore;
use owo_colors::OwoColorize;

use crate::error::{CommandError, Result};

/// Reset command
#[derive(Debug, Default, Args)]
pub struct ResetCommand {
    /// Tools whose hook state should be cleared
    #[arg(value_name = "TOOL")]
    pub tools: Vec<String>,

    /// Clear the hook state of every tool
    #[arg(long, conflicts_with = "tools")]
    pub all: bool,
}

impl ResetCommand {
    /// Clear state in `store`
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was selected or a record cannot be removed
    pub fn run(&self, store: &HookStateStore) -> Result<()> {
        if self.all {
            store.clear_all()?;
            println!(
                "{} Cleared all hook state in {}",
                "✓".bright_green(),
                store.root().display()
            );
            return Ok(());
        }

        if self.tools.is_empty() {
            return Err(CommandError::NothingToReset);
        }

        for tool in &self.tools {
            store.clear(tool)?;
            println!("{} Cleared hook state for {}", "✓".bright_green(), tool.bold());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use miseseq_core::HookPhase;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, HookStateStore) {
        let temp = TempDir::new().unwrap();
        let store = HookStateStore::new(temp.path().join("state"));
        store.save("jq", HookPhase::Preinstall, "echo a").unwrap();
        store.save("fd", HookPhase::Postinstall, "echo b").unwrap();
        (temp, store)
    }

    #[test]
    fn test_reset_named_tools() {
        let (_temp, store) = seeded();
        let cmd = ResetCommand {
            tools: vec!["jq".to_string()],
            all: false,
        };
        cmd.run(&store).unwrap();

        assert!(store.record("jq", HookPhase::Preinstall).unwrap().is_none());
        assert!(store.record("fd", HookPhase::Postinstall).unwrap().is_some());
    }

    #[test]
    fn test_reset_all() {
        let (_temp, store) = seeded();
        let cmd = ResetCommand {
            tools: Vec::new(),
            all: true,
        };
        cmd.run(&store).unwrap();
        assert!(!store.root().exists());
    }

    #[test]
    fn test_reset_requires_selection() {
        let (_temp, store) = seeded();
        let err = ResetCommand::default().run(&store).unwrap_err();
        assert!(matches!(err, CommandError::NothingToReset));
    }

    #[test]
    fn test_reset_rejects_path_like_names() {
        let (_temp, store) = seeded();
        let cmd = ResetCommand {
            tools: vec!["../etc".to_string()],
            all: false,
        };
        assert!(cmd.run(&store).is_err());
    }
}

//! Upgrade command implementation

use clap::Args;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::stats;

/// Upgrade the configured tools that mise already manages
#[derive(Debug, Default, Args)]
pub struct UpgradeCommand {}

impl Command for UpgradeCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let installer = context.installer()?;
        let report = context
            .orchestrator(&installer)
            .upgrade_all(&context.config)?;

        stats::finish(&report, context.runtime.dry_run, context.verbose)
    }
}

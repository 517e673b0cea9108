//! Install command implementation
//!
//! Applies installer settings, runs the default preinstall hooks, installs or
//! upgrades every tool in order, then runs the default postinstall hooks.

use clap::Args;
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::stats;

/// Install command
#[derive(Debug, Default, Args)]
pub struct InstallCommand {}

impl Command for InstallCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let installer = context.installer()?;
        let dry_run = context.runtime.dry_run;

        if dry_run {
            println!("{}", "Dry run: nothing will be installed".yellow());
        }

        let report = context
            .orchestrator(&installer)
            .install_all(&context.config)?;

        stats::finish(&report, dry_run, context.verbose || dry_run)
    }
}

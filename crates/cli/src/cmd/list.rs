//! List command implementation
//!
//! Prints the installation order and, in verbose mode, what mise reports as
//! installed.

use clap::Args;
use miseseq_config::Config;
use miseseq_engine::{ToolInstaller, install_order};
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// List command
#[derive(Debug, Default, Args)]
pub struct ListCommand {}

impl Command for ListCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        println!("{}", "Installation order:".bold());
        for line in order_lines(&context.config)? {
            println!("  {line}");
        }

        if context.verbose {
            println!();
            println!("{}", "Installed tools:".bold());
            let listed = context
                .installer()
                .and_then(|installer| installer.list().map_err(anyhow::Error::from));
            match listed {
                Ok(tools) if tools.is_empty() => println!("  {}", "(none)".dimmed()),
                Ok(tools) => {
                    for tool in tools {
                        let active = if tool.active { " (active)" } else { "" };
                        println!("  {} {}{}", tool.name, tool.version, active.dimmed());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot list installed tools");
                    println!("  {}", "(mise unavailable)".dimmed());
                }
            }
        }

        Ok(())
    }
}

/// `N. name @ version` for each tool in installation order
fn order_lines(config: &Config) -> Result<Vec<String>> {
    let order = install_order(config)?;
    Ok(order
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let version = config
                .tool(name)
                .map(|spec| spec.tool_ref(name).version_or_latest().to_string())
                .unwrap_or_default();
            format!("{}. {name} @ {version}", i + 1)
        })
        .collect())
}

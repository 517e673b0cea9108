//! Status command implementation
//!
//! Shows every configured tool with its installed versions and the state of
//! its recorded hook fingerprints.

use clap::Args;
use comfy_table::{ContentArrangement, Table, presets};
use miseseq_config::{HookDefinition, ToolSpec};
use miseseq_core::HookPhase;
use miseseq_engine::hooks::fingerprint;
use miseseq_engine::{HookStateStore, InstalledTool, ToolInstaller};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Number of digest characters shown
const SHORT_DIGEST: usize = 12;

/// Status command
#[derive(Debug, Default, Args)]
pub struct StatusCommand {}

impl Command for StatusCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let installed = match context
            .installer()
            .and_then(|installer| installer.list().map_err(anyhow::Error::from))
        {
            Ok(tools) => Some(group_installed(tools)),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot query installed tools");
                None
            }
        };

        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Tool", "Version", "Installed", "Preinstall", "Postinstall"]);

        for (name, spec) in &context.config.tools {
            let installed_versions = match &installed {
                Some(map) => map
                    .get(name)
                    .map_or_else(|| "no".to_string(), |v| v.join(", ")),
                None => "?".to_string(),
            };
            table.add_row(vec![
                name.clone(),
                spec.tool_ref(name).version_or_latest().to_string(),
                installed_versions,
                phase_cell(context, name, spec, HookPhase::Preinstall),
                phase_cell(context, name, spec, HookPhase::Postinstall),
            ]);
        }

        println!("{table}");
        println!();
        println!("{} {}", "Config:".bold(), context.config_path.display());
        println!("{} {}", "State directory:".bold(), context.store.root().display());
        println!(
            "{} {} (rustc {})",
            "Version:".bold(),
            env!("CARGO_PKG_VERSION"),
            option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
        );

        Ok(())
    }
}

fn phase_cell(context: &RuntimeContext, name: &str, spec: &ToolSpec, phase: HookPhase) -> String {
    hook_state(&context.store, name, phase, spec.hooks(phase))
}

/// Installed versions keyed by tool name
fn group_installed(tools: Vec<InstalledTool>) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for tool in tools {
        map.entry(tool.name).or_default().push(tool.version);
    }
    map
}

/// Describe the recorded fingerprint of (tool, phase) against its current hooks
fn hook_state(
    store: &HookStateStore,
    tool: &str,
    phase: HookPhase,
    hooks: &[HookDefinition],
) -> String {
    if hooks.is_empty() {
        return "-".to_string();
    }

    match store.record(tool, phase) {
        Ok(None) => "pending".to_string(),
        Ok(Some(digest)) => {
            let short = digest.get(..SHORT_DIGEST).unwrap_or(&digest);
            if hooks.iter().any(|h| fingerprint(&h.run) == digest) {
                format!("current {short}")
            } else {
                format!("changed {short}")
            }
        }
        Err(e) => {
            tracing::warn!(tool, %phase, error = %e, "Cannot read hook state");
            "error".to_string()
        }
    }
}

//! mise-seq CLI library
//!
//! This library contains all the CLI logic for mise-seq, making it reusable
//! for testing and integration with other tools.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod stats;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use miseseq_config::{Config, RuntimeConfig};
use miseseq_engine::{CancelFlag, FailurePolicy};
use std::path::PathBuf;

use command::Command;
use common::RuntimeContext;

/// mise-seq - install tools with mise, in order, with hooks
#[derive(Parser)]
#[command(name = "mise-seq")]
#[command(about = "Install tools with mise in dependency order, running hooks around each")]
#[command(version)]
#[command(long_about = "Install tools with mise in dependency order, running hooks around each

Tools, their versions, dependencies and preinstall/postinstall hooks are
declared in a YAML, JSON or TOML file. Hooks whose script text has not changed
since their last successful run are skipped.

Environment:
  DRY_RUN, FORCE_HOOKS, RUN_POSTINSTALL_ON_UPDATE, STATE_DIR,
  HOOK_TIMEOUT, INSTALL_TIMEOUT, MISE_SHIMS_CUSTOM, MISE_SHIMS_DEFAULT")]
pub struct Cli {
    /// Path to the tools file
    #[arg(
        short,
        long,
        global = true,
        env = "MISE_SEQ_CONFIG",
        value_name = "FILE",
        default_value = "tools.yaml"
    )]
    pub config: PathBuf,

    /// Show what would happen without installing or running hooks
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Run hooks even when their script is unchanged
    #[arg(long, global = true)]
    pub force_hooks: bool,

    /// Re-run postinstall hooks after upgrading an already managed tool
    #[arg(long, global = true)]
    pub postinstall_on_update: bool,

    /// Directory holding hook fingerprints
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Stop at the first tool that fails
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Enable verbose output (shows DEBUG level logs and hook output)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, global = true, env = "MISE_SEQ_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute (default: install)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for mise-seq CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Install or upgrade every configured tool
    Install(cmd::install::InstallCommand),

    /// Upgrade configured tools that mise already manages
    Upgrade(cmd::upgrade::UpgradeCommand),

    /// Show the installation order
    List(cmd::list::ListCommand),

    /// Show installed versions and hook state per tool
    Status(cmd::status::StatusCommand),

    /// Forget recorded hook fingerprints
    #[command(long_about = "Forget recorded hook fingerprints

The affected hooks run again on the next install.

Examples:
  • mise-seq reset node
      → Re-run node's hooks next time

  • mise-seq reset --all
      → Re-run every hook next time")]
    Reset(cmd::reset::ResetCommand),
}

impl Cli {
    /// Runtime settings from the environment with command-line overrides applied
    ///
    /// Flags only switch settings on; an unset flag leaves the environment's
    /// value in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid settings
    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        let runtime = RuntimeConfig::from_env().context("Invalid runtime settings")?;
        Ok(self.apply_overrides(runtime))
    }

    fn apply_overrides(&self, mut runtime: RuntimeConfig) -> RuntimeConfig {
        runtime.dry_run |= self.dry_run;
        runtime.force_hooks |= self.force_hooks;
        runtime.run_postinstall_on_update |= self.postinstall_on_update;
        runtime.debug |= self.verbose;
        if let Some(dir) = &self.state_dir {
            runtime.state_dir.clone_from(dir);
        }
        runtime
    }

    fn policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        }
    }
}

/// Execute the command based on the command type
fn execute_command(command: Commands, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Install(install_cmd) => install_cmd.execute(context)?,
        Commands::Upgrade(upgrade_cmd) => upgrade_cmd.execute(context)?,
        Commands::List(list_cmd) => list_cmd.execute(context)?,
        Commands::Status(status_cmd) => status_cmd.execute(context)?,
        Commands::Reset(_) => unreachable!("Reset command already handled above"),
    }
    Ok(())
}

/// Main entry point for the CLI logic
///
/// # Errors
///
/// Returns an error if:
/// - Runtime settings or logging initialization fail
/// - Configuration loading or validation fails
/// - Command execution fails
pub fn run(cli: Cli) -> Result<()> {
    let runtime = cli.runtime_config()?;
    miseseq_config::logging::init(runtime.debug, cli.log_file.as_deref())?;
    tracing::debug!(
        state_dir = %runtime.state_dir.display(),
        dry_run = runtime.dry_run,
        "Runtime settings"
    );

    let policy = cli.policy();
    let command = cli
        .command
        .unwrap_or(Commands::Install(cmd::install::InstallCommand::default()));

    // Reset only touches the state store and needs no tools file
    if let Commands::Reset(reset_cmd) = &command {
        reset_cmd.run(&common::store_for(&runtime))?;
        return Ok(());
    }

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        handler_flag.cancel();
    })
    .context("Failed to set Ctrl-C handler")?;

    let config = Config::load(&cli.config)?;

    let context = RuntimeContext::new(config, &cli.config, runtime, cancel)?
        .with_policy(policy)
        .with_verbose(cli.verbose);

    execute_command(command, &context)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_install() {
        let cli = Cli::try_parse_from(["mise-seq"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.fail_fast);
        assert_eq!(cli.policy(), FailurePolicy::Continue);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mise-seq",
            "install",
            "--dry-run",
            "--fail-fast",
            "-c",
            "other.toml",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Install(_))));
        assert!(cli.dry_run);
        assert_eq!(cli.policy(), FailurePolicy::Abort);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }

    #[test]
    fn test_overrides_only_switch_on() {
        let cli = Cli::try_parse_from([
            "mise-seq",
            "--force-hooks",
            "--state-dir",
            "/tmp/seq-state",
        ])
        .unwrap();
        let mut base = RuntimeConfig::new("/var/state");
        base.dry_run = true;

        let runtime = cli.apply_overrides(base);
        assert!(runtime.dry_run);
        assert!(runtime.force_hooks);
        assert!(!runtime.run_postinstall_on_update);
        assert_eq!(runtime.state_dir, PathBuf::from("/tmp/seq-state"));
    }

    #[test]
    fn test_reset_arguments() {
        let cli = Cli::try_parse_from(["mise-seq", "reset", "node", "jq"]).unwrap();
        match cli.command {
            Some(Commands::Reset(reset)) => {
                assert_eq!(reset.tools, vec!["node", "jq"]);
                assert!(!reset.all);
            }
            _ => panic!("expected reset"),
        }

        assert!(Cli::try_parse_from(["mise-seq", "reset", "node", "--all"]).is_err());
    }
}

//! Installation orchestrator
//!
//! Walks the tools in installation order, one at a time. A tool the external
//! installer already manages takes the update path (upgrade, then optionally
//! postinstall). Any other tool takes the fresh install path (preinstall,
//! install, activate, postinstall).

use crate::hooks::{HookBatch, HookResult, HookRunner, HookStateStore, applicable};
use crate::installer::ToolInstaller;
use crate::process::CancelFlag;
use crate::resolver::install_order;
use miseseq_config::{Config, DEFAULTS_KEY, HookDefinition, RuntimeConfig, ToolSpec};
use miseseq_core::{Error, HookPhase, Result, When};
use std::ffi::OsString;
use std::fmt;

/// What happens to the remaining tools after one fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep going
    #[default]
    Continue,
    /// Stop at the first failed tool
    Abort,
}

/// Which path a tool took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    /// Fresh install
    Installed,
    /// Already managed, upgraded
    Upgraded,
    /// Described only
    DryRun,
}

impl fmt::Display for ToolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Installed => "installed",
            Self::Upgraded => "upgraded",
            Self::DryRun => "dry-run",
        })
    }
}

/// Final state of one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// Completed
    Ok,
    /// Failed with the given message
    Failed(String),
    /// Not attempted
    Skipped,
}

/// Per-tool entry of an [`InstallReport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Tool name
    pub name: String,
    /// Path taken, `None` when the tool was never attempted
    pub action: Option<ToolAction>,
    /// Result
    pub status: ToolStatus,
}

impl ToolOutcome {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            action: None,
            status: ToolStatus::Skipped,
        }
    }
}

/// Everything that happened during a run
#[derive(Debug, Default)]
pub struct InstallReport {
    /// One entry per tool, in processing order
    pub outcomes: Vec<ToolOutcome>,
    /// Every hook invocation, defaults included
    pub hook_results: Vec<HookResult>,
    /// Non-fatal problems (settings, defaults postinstall)
    pub warnings: Vec<String>,
    /// The run was interrupted; tools after the interruption are skipped
    pub cancelled: bool,
}

impl InstallReport {
    fn count(&self, pred: impl Fn(&ToolStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Tools that completed
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.count(|s| *s == ToolStatus::Ok)
    }

    /// Tools that failed
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, ToolStatus::Failed(_)))
    }

    /// Tools that were not attempted
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|s| *s == ToolStatus::Skipped)
    }

    /// Hooks that actually ran (not skipped, not dry-run)
    #[must_use]
    pub fn hooks_executed(&self) -> usize {
        self.hook_results
            .iter()
            .filter(|r| !r.skipped && !r.dry_run)
            .count()
    }

    /// Hooks skipped because their fingerprint was unchanged
    #[must_use]
    pub fn hooks_skipped(&self) -> usize {
        self.hook_results.iter().filter(|r| r.skipped).count()
    }

    /// Whether no tool failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Failed tools with their messages
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            ToolStatus::Failed(msg) => Some((o.name.as_str(), msg.as_str())),
            _ => None,
        })
    }
}

/// Drives the installer and hook runner over a configuration
pub struct Orchestrator<'a> {
    installer: &'a dyn ToolInstaller,
    store: &'a HookStateStore,
    runtime: &'a RuntimeConfig,
    policy: FailurePolicy,
    cancel: CancelFlag,
    search_path: Option<OsString>,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator with the default failure policy
    pub fn new(
        installer: &'a dyn ToolInstaller,
        store: &'a HookStateStore,
        runtime: &'a RuntimeConfig,
    ) -> Self {
        Self {
            installer,
            store,
            runtime,
            policy: FailurePolicy::default(),
            cancel: CancelFlag::new(),
            search_path: None,
        }
    }

    /// Set the failure policy
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share a cancellation flag with the hook runner
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// PATH handed to hook scripts
    #[must_use]
    pub fn with_search_path(mut self, path: OsString) -> Self {
        self.search_path = Some(path);
        self
    }

    fn dry_run(&self) -> bool {
        self.runtime.dry_run
    }

    fn runner(&self) -> HookRunner<'a> {
        let mut builder = HookRunner::builder(self.store)
            .dry_run(self.runtime.dry_run)
            .timeout(self.runtime.hook_timeout)
            .cancel(self.cancel.clone());
        if let Some(path) = &self.search_path {
            builder = builder.env("PATH", path.clone());
        }
        builder.build()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Install or upgrade every declared tool
    ///
    /// Settings are applied first, then the default preinstall hooks, the
    /// per-tool loop, and the default postinstall hooks.
    ///
    /// # Errors
    ///
    /// Returns an error for configuration and ordering problems (before
    /// anything is mutated), a failing default preinstall hook, or
    /// cancellation before the first step. Per-tool failures and later
    /// cancellation are recorded in the report.
    #[tracing::instrument(
        skip_all,
        fields(installer = self.installer.name(), tools = config.tools.len(), dry_run = self.dry_run())
    )]
    pub fn install_all(&self, config: &Config) -> Result<InstallReport> {
        let order = install_order(config)?;
        self.check_cancelled()?;
        let mut report = InstallReport::default();
        let runner = self.runner();

        self.apply_settings(config, &mut report);

        let defaults_pre = applicable(config.default_hooks(HookPhase::Preinstall), When::Install);
        if !defaults_pre.is_empty() {
            let batch = runner.run_many(DEFAULTS_KEY, HookPhase::Preinstall, defaults_pre);
            match absorb(&mut report, batch, DEFAULTS_KEY, HookPhase::Preinstall) {
                Ok(()) => {}
                Err(Error::Cancelled) => {
                    tracing::warn!("Cancelled during default preinstall hooks");
                    report.cancelled = true;
                    report
                        .outcomes
                        .extend(order.iter().map(|name| ToolOutcome::skipped(name)));
                    return Ok(report);
                }
                Err(e) => return Err(e),
            }
        }

        self.process_tools(config, &order, &mut report, |name, spec, hooks| {
            self.install_tool(&runner, name, spec, hooks)
        })?;
        if report.cancelled {
            return Ok(report);
        }

        let defaults_post =
            applicable(config.default_hooks(HookPhase::Postinstall), When::Install);
        if !defaults_post.is_empty() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            let batch = runner.run_many(DEFAULTS_KEY, HookPhase::Postinstall, defaults_post);
            match absorb(&mut report, batch, DEFAULTS_KEY, HookPhase::Postinstall) {
                Ok(()) => {}
                Err(Error::Cancelled) => report.cancelled = true,
                Err(e) => {
                    tracing::warn!(error = %e, "Default postinstall hooks failed");
                    report.warnings.push(e.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Upgrade the declared tools the installer already manages
    ///
    /// Unmanaged tools are reported as skipped.
    ///
    /// # Errors
    ///
    /// Returns an error for ordering problems or cancellation before the
    /// first tool
    #[tracing::instrument(
        skip_all,
        fields(installer = self.installer.name(), tools = config.tools.len(), dry_run = self.dry_run())
    )]
    pub fn upgrade_all(&self, config: &Config) -> Result<InstallReport> {
        let order = install_order(config)?;
        self.check_cancelled()?;
        let mut report = InstallReport::default();
        let runner = self.runner();

        self.process_tools(config, &order, &mut report, |name, spec, hooks| {
            if self.is_managed(name, spec)? {
                self.update_tool(&runner, name, spec, hooks).map(Some)
            } else {
                tracing::info!(tool = name, "Not managed, skipping upgrade");
                Ok(None)
            }
        })?;

        Ok(report)
    }

    /// Run `step` for each tool in `order`, applying the failure policy
    ///
    /// A fatal error (cancellation included) stops the loop regardless of
    /// policy. Tools not reached are recorded as skipped.
    fn process_tools<F>(
        &self,
        config: &Config,
        order: &[String],
        report: &mut InstallReport,
        mut step: F,
    ) -> Result<()>
    where
        F: FnMut(&str, &ToolSpec, &mut Vec<HookResult>) -> Result<Option<ToolAction>>,
    {
        let mut remaining = order.iter();

        for name in remaining.by_ref() {
            if self.cancel.is_cancelled() {
                tracing::warn!(tool = %name, "Cancelled before tool");
                report.cancelled = true;
                report.outcomes.push(ToolOutcome::skipped(name));
                break;
            }
            let Some(spec) = config.tool(name) else {
                return Err(Error::UnknownTool {
                    name: name.clone(),
                    context: "installation order".to_string(),
                });
            };

            let (outcome, stop) = match step(name.as_str(), spec, &mut report.hook_results) {
                Ok(Some(action)) => (
                    ToolOutcome {
                        name: name.clone(),
                        action: Some(action),
                        status: ToolStatus::Ok,
                    },
                    false,
                ),
                Ok(None) => (ToolOutcome::skipped(name), false),
                Err(e) => {
                    if matches!(e, Error::Cancelled) {
                        tracing::warn!(tool = %name, "Cancelled");
                        report.cancelled = true;
                    } else {
                        tracing::error!(tool = %name, error = %e, "Tool failed");
                    }
                    let stop = e.is_fatal() || self.policy == FailurePolicy::Abort;
                    (
                        ToolOutcome {
                            name: name.clone(),
                            action: None,
                            status: ToolStatus::Failed(e.to_string()),
                        },
                        stop,
                    )
                }
            };

            report.outcomes.push(outcome);
            if stop {
                if !report.cancelled {
                    tracing::warn!("Stopping after first failure");
                }
                break;
            }
        }

        report
            .outcomes
            .extend(remaining.map(|name| ToolOutcome::skipped(name)));
        Ok(())
    }

    /// Apply installer settings; failures are warnings
    fn apply_settings(&self, config: &Config, report: &mut InstallReport) {
        let Some(settings) = &config.settings else {
            return;
        };

        for (key, value) in settings.pairs() {
            if self.dry_run() {
                tracing::info!("[dry-run] Would set {key}={value}");
                continue;
            }
            if let Err(e) = self.installer.apply_setting(key, &value) {
                tracing::warn!(setting = key, error = %e, "Failed to apply setting");
                report.warnings.push(format!("setting {key}: {e}"));
            }
        }
    }

    fn is_managed(&self, name: &str, spec: &ToolSpec) -> Result<bool> {
        let exe = spec.exe.as_deref().filter(|e| !e.is_empty()).unwrap_or(name);
        self.installer.is_managed(exe)
    }

    /// Either path for one tool, chosen by whether it is already managed
    fn install_tool(
        &self,
        runner: &HookRunner<'_>,
        name: &str,
        spec: &ToolSpec,
        hooks: &mut Vec<HookResult>,
    ) -> Result<Option<ToolAction>> {
        if self.is_managed(name, spec)? {
            return self.update_tool(runner, name, spec, hooks).map(Some);
        }

        let tool_spec = spec.spec_string(name);
        tracing::info!(tool = name, spec = %tool_spec, "Installing");

        run_phase(runner, name, spec, HookPhase::Preinstall, When::Install, hooks)?;

        if self.dry_run() {
            tracing::info!("[dry-run] Would install {tool_spec}");
        } else {
            self.installer.install(&tool_spec)?;
            self.installer.set_global(&tool_spec)?;
        }

        run_phase(runner, name, spec, HookPhase::Postinstall, When::Install, hooks)?;

        Ok(Some(if self.dry_run() {
            ToolAction::DryRun
        } else {
            ToolAction::Installed
        }))
    }

    fn update_tool(
        &self,
        runner: &HookRunner<'_>,
        name: &str,
        spec: &ToolSpec,
        hooks: &mut Vec<HookResult>,
    ) -> Result<ToolAction> {
        tracing::info!(tool = name, "Already managed, upgrading");

        if self.dry_run() {
            tracing::info!("[dry-run] Would upgrade {name}");
        } else {
            self.installer.upgrade(name)?;
        }

        if self.runtime.run_postinstall_on_update {
            run_phase(runner, name, spec, HookPhase::Postinstall, When::Update, hooks)?;
        }

        Ok(if self.dry_run() {
            ToolAction::DryRun
        } else {
            ToolAction::Upgraded
        })
    }
}

/// Run the hooks of one phase that apply under `filter`
fn run_phase(
    runner: &HookRunner<'_>,
    name: &str,
    spec: &ToolSpec,
    phase: HookPhase,
    filter: When,
    hooks: &mut Vec<HookResult>,
) -> Result<()> {
    let selected: Vec<&HookDefinition> = applicable(spec.hooks(phase), filter);
    if selected.is_empty() {
        return Ok(());
    }
    let batch = runner.run_many(name, phase, selected);
    let (results, outcome) = split(batch, name, phase);
    hooks.extend(results);
    outcome
}

/// Move a batch's results into the report and surface its failure
fn absorb(report: &mut InstallReport, batch: HookBatch, tool: &str, phase: HookPhase) -> Result<()> {
    let (results, outcome) = split(batch, tool, phase);
    report.hook_results.extend(results);
    outcome
}

fn split(batch: HookBatch, tool: &str, phase: HookPhase) -> (Vec<HookResult>, Result<()>) {
    let outcome = match batch.error {
        None => Ok(()),
        Some(Error::Cancelled) => Err(Error::Cancelled),
        Some(e) => {
            let cause = match e {
                Error::HookExecution(msg) => msg,
                other => other.to_string(),
            };
            let hook = batch.failed_hook.as_deref().unwrap_or("unnamed");
            Err(Error::HookExecution(format!(
                "{phase} hook ({hook}) failed for {tool}: {cause}"
            )))
        }
    };
    (batch.results, outcome)
}

//! Run summary

use miseseq_engine::{HookResult, InstallReport, ToolAction, ToolStatus};
use owo_colors::OwoColorize;

use crate::error::{CommandError, Result};

/// Counts derived from an [`InstallReport`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    installed: usize,
    upgraded: usize,
    dry_run: usize,
    failed: usize,
    skipped: usize,
    hooks_run: usize,
    hooks_skipped: usize,
    hooks_failed: usize,
}

impl RunStats {
    pub fn from_report(report: &InstallReport) -> Self {
        let mut stats = Self::default();
        for outcome in &report.outcomes {
            match (&outcome.status, outcome.action) {
                (ToolStatus::Failed(_), _) => stats.failed += 1,
                (ToolStatus::Skipped, _) => stats.skipped += 1,
                (ToolStatus::Ok, Some(ToolAction::Installed)) => stats.installed += 1,
                (ToolStatus::Ok, Some(ToolAction::Upgraded)) => stats.upgraded += 1,
                (ToolStatus::Ok, Some(ToolAction::DryRun) | None) => stats.dry_run += 1,
            }
        }
        for result in &report.hook_results {
            if result.skipped {
                stats.hooks_skipped += 1;
            } else if !result.is_success() {
                stats.hooks_failed += 1;
            } else if !result.dry_run {
                stats.hooks_run += 1;
            }
        }
        stats
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.installed + self.upgraded + self.dry_run + self.failed + self.skipped
    }

    pub fn print_summary(&self, dry_run: bool) {
        if dry_run {
            println!(
                "{} {} would be processed",
                "●".bright_green(),
                self.dry_run.to_string().bright_white().bold()
            );
        } else {
            let mut parts = vec![format!(
                "{} {} installed",
                "●".bright_green(),
                self.installed.to_string().bright_green().bold()
            )];
            if self.upgraded > 0 {
                parts.push(format!(
                    "{} {} upgraded",
                    "●".bright_blue(),
                    self.upgraded.to_string().bright_blue().bold()
                ));
            }
            if self.failed > 0 {
                parts.push(format!(
                    "{} {} failed",
                    "●".bright_red(),
                    self.failed.to_string().bright_red().bold()
                ));
            }
            println!("{}", parts.join(" | "));
        }

        if self.skipped > 0 {
            println!("  {}", format!("{} tools skipped", self.skipped).dimmed());
        }

        let hooks = self.hooks_run + self.hooks_skipped + self.hooks_failed;
        if hooks > 0 {
            let mut parts = Vec::new();
            if self.hooks_run > 0 {
                parts.push(format!("{} hooks run", self.hooks_run));
            }
            if self.hooks_skipped > 0 {
                parts.push(format!("{} unchanged", self.hooks_skipped));
            }
            if self.hooks_failed > 0 {
                parts.push(format!("{} failed", self.hooks_failed));
            }
            if !parts.is_empty() {
                println!("  {}", parts.join(", ").dimmed());
            }
        }
    }
}

/// Print per-tool failures and report warnings
pub fn print_problems(report: &InstallReport) {
    for warning in &report.warnings {
        println!("{}: {warning}", "Warning".yellow());
    }
    for (tool, message) in report.failures() {
        println!("{} {}: {message}", "✗".bright_red(), tool.bold());
    }
    if report.cancelled {
        println!("{}", "Cancelled: remaining tools were not processed".yellow());
    }
}

/// Print everything a finished run produced and map it to an exit status
///
/// # Errors
///
/// Returns [`miseseq_core::Error::Cancelled`] for an interrupted run and
/// [`CommandError::InstallFailed`] when any tool failed
pub fn finish(report: &InstallReport, dry_run: bool, show_hook_output: bool) -> Result<()> {
    if show_hook_output {
        print_hook_output(&report.hook_results);
    }
    print_problems(report);

    let stats = RunStats::from_report(report);
    println!();
    stats.print_summary(dry_run);

    if report.cancelled {
        return Err(miseseq_core::Error::Cancelled.into());
    }
    if stats.failed() > 0 {
        return Err(CommandError::InstallFailed {
            failed: stats.failed(),
            total: stats.total(),
        });
    }
    Ok(())
}

/// Print captured hook output (verbose mode)
pub fn print_hook_output(results: &[HookResult]) {
    for result in results.iter().filter(|r| !r.skipped) {
        let output = result.stdout.trim_end();
        if output.is_empty() {
            continue;
        }
        println!(
            "{} {} {}",
            result.tool.bold(),
            result.phase.dimmed(),
            result.label().dimmed()
        );
        for line in output.lines() {
            println!("  {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use miseseq_engine::ToolOutcome;

    fn outcome(name: &str, action: Option<ToolAction>, status: ToolStatus) -> ToolOutcome {
        ToolOutcome {
            name: name.to_string(),
            action,
            status,
        }
    }

    #[test]
    fn test_counts_by_status_and_action() {
        let report = InstallReport {
            outcomes: vec![
                outcome("a", Some(ToolAction::Installed), ToolStatus::Ok),
                outcome("b", Some(ToolAction::Upgraded), ToolStatus::Ok),
                outcome("c", None, ToolStatus::Failed("boom".to_string())),
                outcome("d", None, ToolStatus::Skipped),
            ],
            ..InstallReport::default()
        };

        let stats = RunStats::from_report(&report);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.installed, 1);
        assert_eq!(stats.upgraded, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_finish_maps_report_to_exit_status() {
        let ok = InstallReport {
            outcomes: vec![outcome("a", Some(ToolAction::Installed), ToolStatus::Ok)],
            ..InstallReport::default()
        };
        assert!(finish(&ok, false, false).is_ok());

        let failed = InstallReport {
            outcomes: vec![
                outcome("a", Some(ToolAction::Installed), ToolStatus::Ok),
                outcome("b", None, ToolStatus::Failed("boom".to_string())),
            ],
            ..InstallReport::default()
        };
        assert!(matches!(
            finish(&failed, false, false),
            Err(CommandError::InstallFailed { failed: 1, total: 2 })
        ));
    }

    #[test]
    fn test_finish_reports_cancellation_after_partial_progress() {
        let report = InstallReport {
            outcomes: vec![
                outcome("a", Some(ToolAction::Installed), ToolStatus::Ok),
                outcome("b", None, ToolStatus::Skipped),
            ],
            cancelled: true,
            ..InstallReport::default()
        };
        let stats = RunStats::from_report(&report);
        assert_eq!(stats.installed, 1);
        assert_eq!(stats.skipped, 1);
        assert!(matches!(
            finish(&report, false, false),
            Err(CommandError::Core(miseseq_core::Error::Cancelled))
        ));
    }

    #[test]
    fn test_empty_report() {
        let stats = RunStats::from_report(&InstallReport::default());
        assert_eq!(stats, RunStats::default());
        assert_eq!(stats.total(), 0);
    }
}

//! Hook execution engine
//!
//! Runs hook scripts one at a time through `sh -c`, gated by the fingerprint
//! store. Each invocation produces a [`HookResult`]; batches keep going past
//! individual failures and report the last one.

use super::state::HookStateStore;
use crate::process::{CancelFlag, Completion, run_bounded};
use indexmap::IndexMap;
use miseseq_config::HookDefinition;
use miseseq_core::{Error, HookPhase};
use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

/// Default per-hook timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Why a hook invocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFailure {
    /// The script exited non-zero (or was killed by a signal)
    Exit {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured stderr (or stdout when stderr was empty)
        stderr: String,
    },
    /// The script exceeded its timeout and was killed
    Timeout(Duration),
    /// The run was cancelled while the script was running
    Cancelled,
    /// The script could not be started
    Spawn(String),
    /// The fingerprint record could not be read
    State(String),
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "exit code {code}")?,
                    None => write!(f, "terminated by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Timeout(t) => write!(f, "timed out after {}s", t.as_secs()),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Spawn(e) => write!(f, "failed to start: {e}"),
            Self::State(e) => write!(f, "{e}"),
        }
    }
}

impl HookFailure {
    /// Convert into the crate error type, attributing it to (tool, phase)
    #[must_use]
    pub fn into_error(self, tool: &str, phase: HookPhase) -> Error {
        match self {
            Self::Timeout(timeout) => Error::HookTimeout {
                tool: tool.to_string(),
                phase: phase.to_string(),
                timeout,
            },
            Self::Cancelled => Error::Cancelled,
            Self::State(msg) => Error::State(msg),
            other => Error::HookExecution(other.to_string()),
        }
    }
}

/// Outcome of one hook invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResult {
    /// Tool the hook belongs to
    pub tool: String,
    /// Hook phase
    pub phase: HookPhase,
    /// Script text
    pub script: String,
    /// Hook description, when one was given
    pub description: Option<String>,
    /// Exit code, when a process ran to completion
    pub exit_code: Option<i32>,
    /// Captured stdout (or the dry-run description)
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Failure, if any
    pub error: Option<HookFailure>,
    /// Wall-clock duration
    pub duration: Duration,
    /// Skipped because the fingerprint was unchanged
    pub skipped: bool,
    /// Described instead of executed
    pub dry_run: bool,
    /// Fingerprint used for the skip decision
    pub fingerprint: String,
}

impl HookResult {
    fn new(tool: &str, phase: HookPhase, script: &str) -> Self {
        Self {
            tool: tool.to_string(),
            phase,
            script: script.to_string(),
            description: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
            duration: Duration::ZERO,
            skipped: false,
            dry_run: false,
            fingerprint: String::new(),
        }
    }

    /// Whether the invocation succeeded (skips and dry runs count as success)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Description, or the first line of the script
    #[must_use]
    pub fn label(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => self.script.lines().next().unwrap_or_default().trim(),
        }
    }
}

/// Results of running a list of hooks
#[derive(Debug, Default)]
pub struct HookBatch {
    /// One result per non-blank script, in order
    pub results: Vec<HookResult>,
    /// The last failure encountered, if any
    pub error: Option<Error>,
    /// Description of the hook that produced `error`
    pub failed_hook: Option<String>,
}

impl HookBatch {
    /// Convert into a `Result`, discarding the individual results
    ///
    /// # Errors
    ///
    /// Returns the last failure of the batch
    pub fn into_result(self) -> miseseq_core::Result<Vec<HookResult>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}

/// Hook execution runner
pub struct HookRunner<'a> {
    store: &'a HookStateStore,
    dry_run: bool,
    timeout: Duration,
    shell: String,
    env_vars: IndexMap<String, OsString>,
    cancel: CancelFlag,
}

impl<'a> HookRunner<'a> {
    /// Create a runner with default settings
    ///
    /// For custom configuration, use [`HookRunner::builder`].
    pub fn new(store: &'a HookStateStore) -> Self {
        Self::builder(store).build()
    }

    /// Create a builder for configuring a `HookRunner`
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let runner = HookRunner::builder(&store)
    ///     .dry_run(true)
    ///     .timeout(Duration::from_secs(60))
    ///     .env("PATH", search_path)
    ///     .build();
    /// ```
    pub fn builder(store: &'a HookStateStore) -> HookRunnerBuilder<'a> {
        HookRunnerBuilder::new(store)
    }

    /// Run a single script for (tool, phase)
    ///
    /// A blank script is a no-op: nothing is spawned and the state store is
    /// neither consulted nor written.
    #[tracing::instrument(skip(self, script))]
    pub fn run(&self, tool: &str, phase: HookPhase, script: &str) -> HookResult {
        let mut result = HookResult::new(tool, phase, script);

        if script.trim().is_empty() {
            tracing::debug!("Skipping blank hook");
            result.skipped = true;
            return result;
        }

        let decision = match self.store.should_run(tool, phase, script) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "Cannot determine hook state");
                let msg = match e {
                    Error::State(msg) => msg,
                    other => other.to_string(),
                };
                result.error = Some(HookFailure::State(msg));
                return result;
            }
        };
        result.fingerprint.clone_from(&decision.current);

        if !decision.run {
            tracing::debug!("Skipping hook (unchanged)");
            result.skipped = true;
            return result;
        }

        if self.dry_run {
            result.dry_run = true;
            result.stdout = format!("[dry-run] Would execute: {script}");
            tracing::info!("{}", result.stdout);
            return result;
        }

        tracing::debug!(reason = decision.reason.as_str(), "Running hook");

        let mut expr = duct::cmd(self.shell.as_str(), ["-c", script])
            .env("MISE_SEQ_TOOL", tool)
            .env("MISE_SEQ_PHASE", phase.as_str());
        for (key, value) in &self.env_vars {
            expr = expr.env(key, value);
        }

        match run_bounded(&expr, self.timeout, &self.cancel) {
            Ok(Completion::Exited(output)) => {
                result.exit_code = output.exit_code;
                result.duration = output.duration;
                if !output.success() {
                    result.error = Some(HookFailure::Exit {
                        code: output.exit_code,
                        stderr: output.diagnostic().to_string(),
                    });
                }
                result.stdout = output.stdout;
                result.stderr = output.stderr;
            }
            Ok(Completion::TimedOut(elapsed)) => {
                result.duration = elapsed;
                result.error = Some(HookFailure::Timeout(self.timeout));
            }
            Ok(Completion::Cancelled) => {
                result.error = Some(HookFailure::Cancelled);
                // Never record a cancelled script
                return result;
            }
            Err(e) => {
                result.error = Some(HookFailure::Spawn(e.to_string()));
            }
        }

        match &result.error {
            None => tracing::debug!(
                elapsed_ms = result.duration.as_millis(),
                "Hook completed successfully"
            ),
            Some(failure) => tracing::error!(
                elapsed_ms = result.duration.as_millis(),
                error = %failure,
                "Hook failed"
            ),
        }

        if (result.error.is_none() || self.store.force())
            && let Err(e) = self.store.save(tool, phase, script)
        {
            tracing::warn!(error = %e, "Failed to save hook state");
        }

        result
    }

    /// Run a hook definition, attaching its description to the result
    pub fn run_hook(&self, tool: &str, phase: HookPhase, hook: &HookDefinition) -> HookResult {
        let mut result = self.run(tool, phase, &hook.run);
        result.description.clone_from(&hook.description);
        result
    }

    /// Run hooks in order, continuing past failures
    ///
    /// Blank scripts are skipped without a result. Every remaining hook is
    /// attempted; the batch carries the last failure. Cancellation stops the
    /// batch immediately.
    pub fn run_many<'h, I>(&self, tool: &str, phase: HookPhase, hooks: I) -> HookBatch
    where
        I: IntoIterator<Item = &'h HookDefinition>,
    {
        let mut batch = HookBatch::default();

        for hook in hooks {
            if hook.run.trim().is_empty() {
                continue;
            }

            let result = self.run_hook(tool, phase, hook);
            if let Some(failure) = &result.error {
                let cancelled = *failure == HookFailure::Cancelled;
                batch.failed_hook = Some(hook.label().to_string());
                batch.error = Some(failure.clone().into_error(tool, phase));
                batch.results.push(result);
                if cancelled {
                    break;
                }
            } else {
                batch.results.push(result);
            }
        }

        batch
    }

    /// Run plain scripts in order; see [`HookRunner::run_many`]
    pub fn run_scripts(&self, tool: &str, phase: HookPhase, scripts: &[&str]) -> HookBatch {
        let hooks: Vec<HookDefinition> = scripts.iter().map(|s| HookDefinition::new(*s)).collect();
        self.run_many(tool, phase, &hooks)
    }
}

/// Builder for [`HookRunner`]
pub struct HookRunnerBuilder<'a> {
    store: &'a HookStateStore,
    dry_run: bool,
    timeout: Duration,
    shell: String,
    env_vars: IndexMap<String, OsString>,
    cancel: CancelFlag,
}

impl<'a> HookRunnerBuilder<'a> {
    /// Create a new builder with required parameters
    ///
    /// This is typically called via [`HookRunner::builder`].
    pub fn new(store: &'a HookStateStore) -> Self {
        Self {
            store,
            dry_run: false,
            timeout: DEFAULT_TIMEOUT,
            shell: "sh".to_string(),
            env_vars: IndexMap::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// Describe hooks instead of executing them
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Upper bound for a single script
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell used to interpret scripts (default `sh`)
    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Add an environment variable passed to every script
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Share a cancellation flag
    #[must_use]
    pub fn cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the runner
    pub fn build(self) -> HookRunner<'a> {
        HookRunner {
            store: self.store,
            dry_run: self.dry_run,
            timeout: self.timeout,
            shell: self.shell,
            env_vars: self.env_vars,
            cancel: self.cancel,
        }
    }
}

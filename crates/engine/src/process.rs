//! Bounded child processes
//!
//! Every external command (hook scripts and installer invocations) runs
//! through [`run_bounded`]: output is captured, the exit status is reported
//! rather than turned into an error, and the child is killed when it exceeds
//! its time budget or the run is cancelled.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How often a running child is checked for timeout and cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation signal
///
/// Cloned into every component that spawns processes; set once (e.g. from a
/// Ctrl-C handler) and never reset.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Wall-clock duration
    pub duration: Duration,
}

impl ProcessOutput {
    /// Whether the process exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }

    fn from_output(output: &std::process::Output, duration: Duration) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration,
        }
    }
}

/// How a bounded process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The process exited on its own (successfully or not)
    Exited(ProcessOutput),
    /// The process was killed after exceeding its timeout
    TimedOut(Duration),
    /// The process was killed because cancellation was requested
    Cancelled,
}

/// Run an expression to completion, timeout, or cancellation
///
/// Stdin is closed; stdout and stderr are captured. A non-zero exit status is
/// reported through [`Completion::Exited`], not as an error.
///
/// # Errors
///
/// Returns an error only if the process cannot be spawned or waited on
pub fn run_bounded(
    expr: &duct::Expression,
    timeout: Duration,
    cancel: &CancelFlag,
) -> io::Result<Completion> {
    if cancel.is_cancelled() {
        return Ok(Completion::Cancelled);
    }

    let start = Instant::now();
    let handle = expr
        .stdin_null()
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()?;

    loop {
        if let Some(output) = handle.wait_timeout(POLL_INTERVAL)? {
            return Ok(Completion::Exited(ProcessOutput::from_output(
                output,
                start.elapsed(),
            )));
        }

        if cancel.is_cancelled() {
            kill(&handle);
            return Ok(Completion::Cancelled);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            kill(&handle);
            return Ok(Completion::TimedOut(elapsed));
        }
    }
}

fn kill(handle: &duct::Handle) {
    if let Err(e) = handle.kill() {
        tracing::warn!(error = %e, "Failed to kill child process");
    }
}

//! External version manager integration
//!
//! The orchestrator never installs anything itself; it delegates to a
//! [`ToolInstaller`]. [`MiseCli`] drives the `mise` command-line program, one
//! bounded child process per operation, with output captured.

use crate::process::{CancelFlag, Completion, ProcessOutput, run_bounded};
use miseseq_core::{Error, Result};
use serde_json::Value as JsonValue;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A tool reported as installed by the version manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    /// Tool name
    pub name: String,
    /// Installed version
    pub version: String,
    /// Config file that requested it, if any
    pub source: Option<String>,
    /// Whether this version is currently active
    pub active: bool,
}

/// Operations the orchestrator needs from a version manager
///
/// All implementations should capture output rather than stream it.
pub trait ToolInstaller {
    /// Human-readable name of the installer
    fn name(&self) -> &str;

    /// Install `spec` (`name@version`)
    fn install(&self, spec: &str) -> Result<ProcessOutput>;

    /// Upgrade an already managed tool
    fn upgrade(&self, name: &str) -> Result<ProcessOutput>;

    /// List installed tools
    fn list(&self) -> Result<Vec<InstalledTool>>;

    /// Whether the installer already manages `name`
    fn is_managed(&self, name: &str) -> Result<bool>;

    /// Make `spec` the active global version
    fn set_global(&self, spec: &str) -> Result<()>;

    /// Apply a named installer setting
    fn apply_setting(&self, key: &str, value: &str) -> Result<()>;
}

/// `mise` command-line client
pub struct MiseCli {
    program: PathBuf,
    timeout: Duration,
    cancel: CancelFlag,
    search_path: Option<OsString>,
    github_token: Option<String>,
}

impl fmt::Debug for MiseCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiseCli")
            .field("program", &self.program)
            .field("timeout", &self.timeout)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl MiseCli {
    /// Default timeout for a single invocation
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    /// Create a client for the given executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            cancel: CancelFlag::new(),
            search_path: None,
            github_token: github_token_from_env(),
        }
    }

    /// Find `mise` on PATH, then under `$MISE_INSTALLATION/bin`
    ///
    /// # Errors
    ///
    /// Returns an error if no executable can be found
    pub fn locate(search_path: Option<&OsString>) -> Result<PathBuf> {
        let cwd = env::current_dir()?;
        let found = match search_path {
            Some(paths) => which::which_in("mise", Some(paths), cwd),
            None => which::which("mise"),
        };
        if let Ok(path) = found {
            return Ok(path);
        }

        if let Some(install) = env::var_os("MISE_INSTALLATION").filter(|v| !v.is_empty()) {
            let candidate = Path::new(&install).join("bin").join("mise");
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(Error::Installer(
            "mise not found on PATH; install it from https://mise.jdx.dev or set MISE_INSTALLATION"
                .to_string(),
        ))
    }

    /// Upper bound for each invocation
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share a cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// PATH passed to every invocation
    #[must_use]
    pub fn with_search_path(mut self, path: OsString) -> Self {
        self.search_path = Some(path);
        self
    }

    fn command(&self, args: &[&str]) -> duct::Expression {
        let mut expr = duct::cmd(&self.program, args.iter().copied());
        if let Some(path) = &self.search_path {
            expr = expr.env("PATH", path);
        }
        if let Some(token) = &self.github_token {
            expr = expr.env("GITHUB_TOKEN", token);
        }
        expr
    }

    /// Run `mise <args>` and return its output regardless of exit status
    #[tracing::instrument(skip(self), fields(program = %self.program.display()))]
    fn exec(&self, args: &[&str]) -> Result<ProcessOutput> {
        let invocation = format!("mise {}", args.join(" "));
        match run_bounded(&self.command(args), self.timeout, &self.cancel) {
            Ok(Completion::Exited(output)) => {
                tracing::debug!(
                    exit_code = ?output.exit_code,
                    elapsed_ms = output.duration.as_millis(),
                    "{invocation} finished"
                );
                Ok(output)
            }
            Ok(Completion::TimedOut(_)) => Err(Error::Installer(format!(
                "{invocation} timed out after {}s",
                self.timeout.as_secs()
            ))),
            Ok(Completion::Cancelled) => Err(Error::Cancelled),
            Err(e) => Err(Error::Installer(format!("Failed to run {invocation}: {e}"))),
        }
    }

    /// Run `mise <args>` and require a zero exit status
    fn exec_checked(&self, args: &[&str]) -> Result<ProcessOutput> {
        let output = self.exec(args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::Installer(format!(
                "mise {} failed ({}): {}",
                args.join(" "),
                exit_label(output.exit_code),
                output.diagnostic()
            )))
        }
    }
}

impl ToolInstaller for MiseCli {
    fn name(&self) -> &str {
        "mise"
    }

    fn install(&self, spec: &str) -> Result<ProcessOutput> {
        self.exec_checked(&["install", spec])
    }

    fn upgrade(&self, name: &str) -> Result<ProcessOutput> {
        self.exec_checked(&["upgrade", name])
    }

    fn list(&self) -> Result<Vec<InstalledTool>> {
        // mise exits non-zero when nothing is installed
        let output = self.exec(&["ls", "--json"])?;
        Ok(parse_list(&output.stdout))
    }

    fn is_managed(&self, name: &str) -> Result<bool> {
        Ok(self.exec(&["which", name])?.success())
    }

    fn set_global(&self, spec: &str) -> Result<()> {
        self.exec_checked(&["use", "-g", spec]).map(|_| ())
    }

    fn apply_setting(&self, key: &str, value: &str) -> Result<()> {
        self.exec_checked(&["settings", "set", key, value])
            .map(|_| ())
    }
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit code {c}"))
}

/// `GITHUB_TOKEN` for child processes, taken from `GH_TOKEN` when not already set
fn github_token_from_env() -> Option<String> {
    if env::var_os("GITHUB_TOKEN").is_some_and(|v| !v.is_empty()) {
        return None;
    }
    env::var("GH_TOKEN").ok().filter(|t| !t.is_empty())
}

/// Parse `mise ls --json` output
///
/// Accepts mise's native map (`{"node": [{"version": ..}]}`) and a flat
/// `{"tools": [{"name": .., "version": ..}]}` list. Empty or unparsable
/// output yields an empty list.
pub fn parse_list(stdout: &str) -> Vec<InstalledTool> {
    let Ok(value) = serde_json::from_str::<JsonValue>(stdout.trim()) else {
        if !stdout.trim().is_empty() {
            tracing::debug!("Ignoring unparsable mise ls output");
        }
        return Vec::new();
    };

    let Some(object) = value.as_object() else {
        return Vec::new();
    };

    if let Some(tools) = object.get("tools").and_then(JsonValue::as_array) {
        return tools
            .iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?;
                Some(entry_to_tool(name, entry))
            })
            .collect();
    }

    object
        .iter()
        .filter_map(|(name, versions)| versions.as_array().map(|v| (name, v)))
        .flat_map(|(name, versions)| versions.iter().map(move |entry| entry_to_tool(name, entry)))
        .collect()
}

fn entry_to_tool(name: &str, entry: &JsonValue) -> InstalledTool {
    let source = match entry.get("source") {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Object(obj)) => obj
            .get("path")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    };

    InstalledTool {
        name: name.to_string(),
        version: entry
            .get("version")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
        source,
        active: entry
            .get("active")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_parse_native_map() {
        let json = r#"{
            "node": [
                {"version": "20.11.0", "requested_version": "20", "active": true,
                 "source": {"type": "mise.toml", "path": "/home/u/.config/mise/config.toml"}},
                {"version": "18.19.0", "active": false}
            ],
            "jq": [{"version": "1.7.1", "active": true}]
        }"#;
        let tools = parse_list(json);
        // Order follows mise's output
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0].name, "node");
        assert_eq!(tools[0].version, "20.11.0");
        assert_eq!(
            tools[0].source.as_deref(),
            Some("/home/u/.config/mise/config.toml")
        );
        assert!(tools[0].active);
        assert!(!tools[1].active);
        assert_eq!(tools[2].name, "jq");
    }

    #[test]
    fn test_parse_flat_list() {
        let json = r#"{"tools": [{"name": "fd", "version": "9.0.0", "source": "tools.yaml"}]}"#;
        let tools = parse_list(json);
        assert_eq!(
            tools,
            vec![InstalledTool {
                name: "fd".to_string(),
                version: "9.0.0".to_string(),
                source: Some("tools.yaml".to_string()),
                active: false,
            }]
        );
    }

    #[test]
    fn test_parse_empty_or_garbage() {
        assert!(parse_list("").is_empty());
        assert!(parse_list("{}").is_empty());
        assert!(parse_list("not json").is_empty());
        assert!(parse_list("[1, 2]").is_empty());
    }

    /// Write a fake `mise` that logs its arguments and answers by subcommand
    fn fake_mise(dir: &TempDir, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("mise");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_cli_operations() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("calls.log");
        let program = fake_mise(
            &dir,
            &format!(
                r#"echo "$@" >> {log}
case "$1" in
  which) [ "$2" = "jq" ] ;;
  ls) echo '{{"jq":[{{"version":"1.7.1"}}]}}' ;;
  install) [ "$2" != "broken@latest" ] || {{ echo "no such tool" >&2; exit 1; }} ;;
esac"#,
                log = log.display()
            ),
        );
        let cli = MiseCli::new(&program);

        assert!(cli.is_managed("jq").unwrap());
        assert!(!cli.is_managed("fd").unwrap());
        assert_eq!(cli.list().unwrap()[0].version, "1.7.1");
        cli.install("fd@latest").unwrap();
        cli.set_global("fd@latest").unwrap();
        cli.upgrade("jq").unwrap();
        cli.apply_setting("experimental", "true").unwrap();

        let err = cli.install("broken@latest").unwrap_err();
        assert!(err.to_string().contains("no such tool"), "{err}");

        let calls = std::fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(
            calls,
            vec![
                "which jq",
                "which fd",
                "ls --json",
                "install fd@latest",
                "use -g fd@latest",
                "upgrade jq",
                "settings set experimental true",
                "install broken@latest",
            ]
        );
    }

    #[test]
    fn test_cli_timeout() {
        let dir = TempDir::new().unwrap();
        let program = fake_mise(&dir, "exec sleep 5");
        let cli = MiseCli::new(&program).with_timeout(Duration::from_millis(200));
        let err = cli.install("jq@latest").unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[test]
    fn test_cli_cancelled() {
        let dir = TempDir::new().unwrap();
        let program = fake_mise(&dir, "exit 0");
        let cancel = CancelFlag::new();
        cancel.cancel();
        let cli = MiseCli::new(&program).with_cancel(cancel);
        assert!(matches!(cli.upgrade("jq").unwrap_err(), Error::Cancelled));
    }

    #[test]
    #[serial]
    fn test_github_token_forwarding() {
        temp_env::with_vars(
            [("GITHUB_TOKEN", None), ("GH_TOKEN", Some("gh-secret"))],
            || assert_eq!(github_token_from_env().as_deref(), Some("gh-secret")),
        );
        temp_env::with_vars(
            [("GITHUB_TOKEN", Some("already")), ("GH_TOKEN", Some("gh-secret"))],
            || assert!(github_token_from_env().is_none()),
        );
    }

    #[test]
    #[serial]
    fn test_debug_redacts_token() {
        temp_env::with_vars(
            [("GITHUB_TOKEN", None), ("GH_TOKEN", Some("gh-secret"))],
            || {
                let cli = MiseCli::new("mise");
                let debug = format!("{cli:?}");
                assert!(!debug.contains("gh-secret"));
                assert!(debug.contains("redacted"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_locate_in_search_path() {
        let dir = TempDir::new().unwrap();
        let program = fake_mise(&dir, "exit 0");
        let path = OsString::from(dir.path());
        assert_eq!(MiseCli::locate(Some(&path)).unwrap(), program);
    }
}

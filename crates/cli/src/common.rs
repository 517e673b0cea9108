//! Common types shared across CLI commands

use anyhow::{Context, Result};
use miseseq_config::{Config, RuntimeConfig};
use miseseq_engine::{
    CancelFlag, FailurePolicy, HookStateStore, MiseCli, Orchestrator, ToolInstaller,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runtime context for CLI commands
///
/// Consolidates what most commands need: the loaded configuration, the
/// runtime settings, the hook state store and the cancellation flag.
pub struct RuntimeContext {
    /// Shared configuration
    pub config: Arc<Config>,
    /// Path the configuration was loaded from
    pub config_path: PathBuf,
    /// Runtime settings after CLI overrides
    pub runtime: RuntimeConfig,
    /// Hook fingerprint store
    pub store: HookStateStore,
    /// Set from the Ctrl-C handler
    pub cancel: CancelFlag,
    /// What to do after a tool fails
    pub policy: FailurePolicy,
    /// Verbose output requested
    pub verbose: bool,
    search_path: OsString,
}

impl RuntimeContext {
    /// Create a new runtime context
    ///
    /// # Errors
    ///
    /// Returns an error if the child-process PATH cannot be assembled
    pub fn new(
        config: Config,
        config_path: &Path,
        runtime: RuntimeConfig,
        cancel: CancelFlag,
    ) -> Result<Self> {
        let search_path = runtime
            .search_path()
            .context("Failed to assemble PATH for child processes")?;
        let store = store_for(&runtime);

        Ok(Self {
            config: Arc::new(config),
            config_path: config_path.to_path_buf(),
            runtime,
            store,
            cancel,
            policy: FailurePolicy::default(),
            verbose: false,
            search_path,
        })
    }

    /// Set the failure policy
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mark verbose output
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// PATH handed to hooks and the installer
    #[inline]
    pub fn search_path(&self) -> &OsString {
        &self.search_path
    }

    /// Locate and configure the `mise` client
    ///
    /// # Errors
    ///
    /// Returns an error if `mise` cannot be found
    pub fn installer(&self) -> Result<MiseCli> {
        let program = MiseCli::locate(Some(&self.search_path))?;
        tracing::debug!(program = %program.display(), "Using mise");
        Ok(MiseCli::new(program)
            .with_timeout(self.runtime.install_timeout)
            .with_cancel(self.cancel.clone())
            .with_search_path(self.search_path.clone()))
    }

    /// Orchestrator wired to this context
    pub fn orchestrator<'a>(&'a self, installer: &'a dyn ToolInstaller) -> Orchestrator<'a> {
        Orchestrator::new(installer, &self.store, &self.runtime)
            .with_policy(self.policy)
            .with_cancel(self.cancel.clone())
            .with_search_path(self.search_path.clone())
    }
}

/// Hook state store honoring the runtime flags
pub fn store_for(runtime: &RuntimeConfig) -> HookStateStore {
    HookStateStore::new(&runtime.state_dir)
        .with_force(runtime.force_hooks)
        .with_postinstall_on_update(runtime.run_postinstall_on_update)
}

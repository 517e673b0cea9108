//! Configuration management
//!
//! This module handles loading and validating the declared tool set.

use crate::Result;
use indexmap::IndexMap;
use miseseq_core::{Error, HookPhase, ToolRef, When};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// State key under which the `defaults` hooks are recorded
pub const DEFAULTS_KEY: &str = "defaults";

/// Unified configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Explicit installation order; overrides dependency resolution when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_order: Vec<String>,

    /// Declared tools, in declaration order
    #[serde(default, deserialize_with = "deserialize_tools")]
    pub tools: IndexMap<String, ToolSpec>,

    /// Hooks run once around the whole installation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,

    /// Installer settings applied before installing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// A single tool declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Target version (`latest` when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Executable name, when it differs from the tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe: Option<String>,

    /// Hooks run before installation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preinstall: Vec<HookDefinition>,

    /// Hooks run after installation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postinstall: Vec<HookDefinition>,

    /// Tools that must be installed first (`name` or `name@version`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl ToolSpec {
    /// Reference to this tool at its declared version
    #[must_use]
    pub fn tool_ref(&self, name: &str) -> ToolRef {
        ToolRef::new(name, self.version.clone().filter(|v| !v.is_empty()))
    }

    /// The `name@version` string handed to the installer
    #[must_use]
    pub fn spec_string(&self, name: &str) -> String {
        self.tool_ref(name).spec()
    }

    /// Parsed dependency references
    #[must_use]
    pub fn dependencies(&self) -> Vec<ToolRef> {
        self.depends.iter().map(|d| ToolRef::parse(d)).collect()
    }

    /// Hooks declared for a phase
    #[must_use]
    pub fn hooks(&self, phase: HookPhase) -> &[HookDefinition] {
        match phase {
            HookPhase::Preinstall => &self.preinstall,
            HookPhase::Postinstall => &self.postinstall,
        }
    }
}

/// A hook script with optional description and applicability conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookDefinition {
    /// Shell script to execute
    #[serde(default)]
    pub run: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When the hook applies; empty means always
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<When>,
}

impl HookDefinition {
    /// Create a hook that always applies
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            ..Self::default()
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the applicability conditions
    #[must_use]
    pub fn with_when(mut self, when: Vec<When>) -> Self {
        self.when = when;
        self
    }

    /// Whether this hook applies under `filter`
    #[must_use]
    pub fn applies(&self, filter: When) -> bool {
        filter.admits(&self.when)
    }

    /// Description, or the first line of the script when none was given
    #[must_use]
    pub fn label(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => self.run.lines().next().unwrap_or_default().trim(),
        }
    }
}

/// Hooks run once per install invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// Hooks run before any tool is installed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preinstall: Vec<HookDefinition>,

    /// Hooks run after all tools are installed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postinstall: Vec<HookDefinition>,
}

impl Defaults {
    /// Hooks declared for a phase
    #[must_use]
    pub fn hooks(&self, phase: HookPhase) -> &[HookDefinition] {
        match phase {
            HookPhase::Preinstall => &self.preinstall,
            HookPhase::Postinstall => &self.postinstall,
        }
    }

    /// Check if there are no hooks defined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preinstall.is_empty() && self.postinstall.is_empty()
    }
}

/// Installer settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// npm backend settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<NpmSettings>,

    /// Enable experimental installer features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<SettingValue>,
}

/// npm backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpmSettings {
    /// Package manager used for npm tools (npm, bun, pnpm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
}

/// A setting value written either as a boolean or as a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// `true` / `false`
    Bool(bool),
    /// Any other literal
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Settings {
    /// Key/value pairs to apply, in a stable order, skipping unset entries
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(pm) = self
            .npm
            .as_ref()
            .and_then(|n| n.package_manager.as_deref())
            .filter(|v| !v.is_empty())
        {
            pairs.push(("npm.package_manager", pm.to_string()));
        }
        if let Some(value) = &self.experimental {
            let value = value.to_string();
            if !value.is_empty() {
                pairs.push(("experimental", value));
            }
        }
        pairs
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.cue`, recognized but not supported
    Cue,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is missing or unknown
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("cue") => Ok(Self::Cue),
            _ => Err(Error::Config(format!(
                "Cannot determine config format of {} (expected .json, .yaml, .yml or .toml)",
                path.display()
            ))),
        }
    }

    /// Get the string name of this format
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Cue => "cue",
        }
    }

    /// Parse configuration text in this format
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the format is unsupported
    pub fn parse(&self, content: &str) -> Result<Config> {
        let parsed = match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => {
                if content.trim().is_empty() {
                    return Ok(Config::default());
                }
                serde_yaml::from_str(content).map_err(|e| e.to_string())
            }
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Cue => {
                return Err(Error::Config(
                    "CUE configuration is not supported; convert it to YAML, JSON or TOML"
                        .to_string(),
                ));
            }
        };

        parsed.map_err(|e| Error::Config(format!("Failed to parse {} config: {e}", self.name())))
    }
}

impl Config {
    /// Load, parse and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, cannot be parsed, or fails validation
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let config = Self::from_str_with_format(&content, format).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            format = format.name(),
            tools = config.tools.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Parse configuration text without validating it
    ///
    /// # Errors
    ///
    /// Returns error if parsing fails
    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> Result<Self> {
        format.parse(content)
    }

    /// Check the configuration for errors that must stop a run before it starts
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an unsafe tool name, an unknown or
    /// duplicated entry in `tools_order`, an unknown dependency, or an empty hook
    pub fn validate(&self) -> Result<()> {
        for (name, spec) in &self.tools {
            validate_tool_name(name)?;

            for dep in spec.dependencies() {
                if !self.tools.contains_key(&dep.name) {
                    return Err(Error::UnknownDependency {
                        tool: name.clone(),
                        dependency: dep.name,
                    });
                }
            }

            for phase in HookPhase::ALL {
                validate_hooks(name, phase, spec.hooks(phase))?;
            }
        }

        let mut seen = HashSet::new();
        for name in &self.tools_order {
            if !self.tools.contains_key(name) {
                return Err(Error::UnknownTool {
                    name: name.clone(),
                    context: "tools_order".to_string(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!(
                    "tools_order lists '{name}' more than once"
                )));
            }
        }

        if let Some(defaults) = &self.defaults {
            for phase in HookPhase::ALL {
                validate_hooks(DEFAULTS_KEY, phase, defaults.hooks(phase))?;
            }
        }

        Ok(())
    }

    /// The explicit installation order, if one was declared
    #[must_use]
    pub fn explicit_order(&self) -> Option<&[String]> {
        (!self.tools_order.is_empty()).then_some(self.tools_order.as_slice())
    }

    /// Look up a tool declaration
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Default hooks for a phase (empty when none are declared)
    #[must_use]
    pub fn default_hooks(&self, phase: HookPhase) -> &[HookDefinition] {
        match &self.defaults {
            Some(defaults) => defaults.hooks(phase),
            None => &[],
        }
    }
}

/// Tool names become state directory names, so they must be safe path segments
fn validate_tool_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Config("Tool name cannot be empty".to_string()));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(Error::Config(format!(
            "Tool name '{name}' cannot contain path separators or be '.' or '..'"
        )));
    }
    if name == DEFAULTS_KEY {
        return Err(Error::Config(format!(
            "Tool name '{DEFAULTS_KEY}' is reserved for default hooks"
        )));
    }
    Ok(())
}

fn validate_hooks(owner: &str, phase: HookPhase, hooks: &[HookDefinition]) -> Result<()> {
    for (index, hook) in hooks.iter().enumerate() {
        if hook.run.trim().is_empty() {
            return Err(Error::Config(format!(
                "'{owner}' has an empty {phase} hook at index {index}"
            )));
        }
    }
    Ok(())
}

/// Accept `name:` with no body as a tool with no settings
fn deserialize_tools<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, ToolSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Option<ToolSpec>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, spec)| (name, spec.unwrap_or_default()))
        .collect())
}

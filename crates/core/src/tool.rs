//! Tool references
//!
//! A tool is referenced either by bare name (`ripgrep`) or with a version
//! constraint (`node@20`). Dependency edges compare references by name only.

use std::fmt;

/// Version used when a reference carries no constraint
pub const LATEST: &str = "latest";

/// A tool name optionally paired with a version constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolRef {
    /// Tool name
    pub name: String,
    /// Version constraint, `None` meaning latest
    pub version: Option<String>,
}

impl ToolRef {
    /// Create a reference from its parts
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse a `name` or `name@version` literal
    ///
    /// The split happens at the last `@` so that scoped names such as
    /// `npm:@antfu/ni@0.21` keep their leading segment. An empty version
    /// (`name@`) is treated as absent.
    #[must_use]
    pub fn parse(literal: &str) -> Self {
        let literal = literal.trim();
        match literal.rfind('@') {
            Some(idx) if idx > 0 && !literal[..idx].ends_with(':') => {
                let (name, version) = (&literal[..idx], &literal[idx + 1..]);
                let version = (!version.is_empty()).then(|| version.to_string());
                Self::new(name, version)
            }
            _ => Self::new(literal, None),
        }
    }

    /// The version constraint, or [`LATEST`] when absent
    #[must_use]
    pub fn version_or_latest(&self) -> &str {
        self.version.as_deref().unwrap_or(LATEST)
    }

    /// The `name@version` string handed to the installer
    #[must_use]
    pub fn spec(&self) -> String {
        format!("{}@{}", self.name, self.version_or_latest())
    }
}

impl fmt::Display for ToolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

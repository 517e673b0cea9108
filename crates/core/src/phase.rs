//! Hook phases and applicability conditions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hook execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
    /// Before the tool is installed or upgraded
    Preinstall,
    /// After the tool is installed or upgraded
    Postinstall,
}

impl HookPhase {
    /// All phases, in execution order
    pub const ALL: [HookPhase; 2] = [HookPhase::Preinstall, HookPhase::Postinstall];

    /// Get the string name of this hook phase
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Preinstall => "preinstall",
            HookPhase::Postinstall => "postinstall",
        }
    }

    /// Name of the fingerprint file recorded for this phase
    #[must_use]
    pub fn state_file_name(&self) -> String {
        format!("{}.sha256", self.as_str())
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition under which a hook applies
///
/// A hook without any condition is treated as [`When::Always`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum When {
    /// Only when the tool is installed for the first time
    Install,
    /// Only when an already managed tool is upgraded
    Update,
    /// On every install and upgrade
    Always,
}

impl When {
    /// Get the string name of this condition
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            When::Install => "install",
            When::Update => "update",
            When::Always => "always",
        }
    }

    /// Whether a hook tagged with `conditions` applies when filtering for `self`
    ///
    /// `Install` and `Update` accept hooks tagged `always` or the same value.
    /// `Always` accepts only hooks tagged `always` (or untagged).
    #[must_use]
    pub fn admits(self, conditions: &[When]) -> bool {
        if conditions.is_empty() {
            return true;
        }
        conditions
            .iter()
            .any(|c| *c == When::Always || (self != When::Always && *c == self))
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Hook applicability filtering
//!
//! Applied to a hook list before it reaches the runner; the fingerprint
//! logic never sees the `when` conditions.

use miseseq_config::HookDefinition;
use miseseq_core::When;

/// Hooks from `hooks` that apply under `filter`, in declaration order
pub fn applicable(hooks: &[HookDefinition], filter: When) -> Vec<&HookDefinition> {
    hooks.iter().filter(|h| h.applies(filter)).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn hooks() -> Vec<HookDefinition> {
        vec![
            HookDefinition::new("untagged"),
            HookDefinition::new("install").with_when(vec![When::Install]),
            HookDefinition::new("update").with_when(vec![When::Update]),
            HookDefinition::new("always").with_when(vec![When::Always]),
            HookDefinition::new("both").with_when(vec![When::Install, When::Update]),
        ]
    }

    fn runs(filter: When) -> Vec<String> {
        let hooks = hooks();
        applicable(&hooks, filter)
            .into_iter()
            .map(|h| h.run.clone())
            .collect()
    }

    #[test]
    fn test_install_filter() {
        assert_eq!(runs(When::Install), vec!["untagged", "install", "always", "both"]);
    }

    #[test]
    fn test_update_filter() {
        assert_eq!(runs(When::Update), vec!["untagged", "update", "always", "both"]);
    }

    #[test]
    fn test_always_filter() {
        assert_eq!(runs(When::Always), vec!["untagged", "always"]);
    }

    #[test]
    fn test_empty_list() {
        assert!(applicable(&[], When::Install).is_empty());
    }
}

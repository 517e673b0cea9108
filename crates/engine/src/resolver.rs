//! Installation order resolution
//!
//! Topological sort of the declared tools over their `depends` edges using
//! Kahn's algorithm. The graph is rebuilt on every call from the tool map.
//! Ties are broken lexicographically so the order is stable across runs.

use indexmap::IndexMap;
use miseseq_config::{Config, ToolSpec};
use miseseq_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Compute an installation order in which every dependency precedes its dependents
///
/// Dependency references are compared by name; versions do not affect the
/// graph. Repeated references to the same dependency count as one edge.
///
/// # Errors
///
/// - [`Error::UnknownDependency`] when a tool depends on an undeclared tool
/// - [`Error::DependencyCycle`] when no valid order exists, naming the tools
///   that could not be ordered
#[tracing::instrument(skip(tools), fields(tools = tools.len()))]
pub fn resolve(tools: &IndexMap<String, ToolSpec>) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> =
        tools.keys().map(|name| (name.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, BTreeSet<&str>> = HashMap::new();

    for (name, spec) in tools {
        for dep in spec.dependencies() {
            let Some((dep_name, _)) = tools.get_key_value(&dep.name) else {
                return Err(Error::UnknownDependency {
                    tool: name.clone(),
                    dependency: dep.name,
                });
            };

            // Count each distinct edge once
            if dependents
                .entry(dep_name.as_str())
                .or_default()
                .insert(name.as_str())
                && let Some(degree) = in_degree.get_mut(name.as_str())
            {
                *degree += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(tools.len());
    while let Some(current) = ready.pop_first() {
        order.push(current.to_string());

        if let Some(children) = dependents.get(current) {
            for &child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(child);
                    }
                }
            }
        }
    }

    if order.len() < tools.len() {
        let tools: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        return Err(Error::DependencyCycle { tools });
    }

    tracing::debug!(order = ?order, "Resolved installation order");
    Ok(order)
}

/// The order in which a configuration's tools are processed
///
/// An explicit `tools_order` takes precedence; the resolver runs only when
/// none is declared.
///
/// # Errors
///
/// Returns an error if the explicit order names an undeclared tool, or if
/// dependency resolution fails
pub fn install_order(config: &Config) -> Result<Vec<String>> {
    match config.explicit_order() {
        Some(explicit) => {
            if let Some(unknown) = explicit.iter().find(|n| !config.tools.contains_key(*n)) {
                return Err(Error::UnknownTool {
                    name: unknown.clone(),
                    context: "tools_order".to_string(),
                });
            }
            tracing::debug!("Using explicit tools_order");
            Ok(explicit.to_vec())
        }
        None => resolve(&config.tools),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn tools(spec: &[(&str, &[&str])]) -> IndexMap<String, ToolSpec> {
        spec.iter()
            .map(|(name, deps)| {
                (
                    (*name).to_string(),
                    ToolSpec {
                        depends: deps.iter().map(|d| (*d).to_string()).collect(),
                        ..ToolSpec::default()
                    },
                )
            })
            .collect()
    }

    fn assert_valid_order(tools: &IndexMap<String, ToolSpec>, order: &[String]) {
        assert_eq!(order.len(), tools.len(), "order must be a permutation");
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        for (name, spec) in tools {
            for dep in spec.dependencies() {
                assert!(
                    position[dep.name.as_str()] < position[name.as_str()],
                    "{} must precede {name} in {order:?}",
                    dep.name
                );
            }
        }
    }

    #[test]
    fn test_empty() {
        assert!(resolve(&IndexMap::new()).unwrap().is_empty());
    }

    #[test]
    fn test_chain() {
        let t = tools(&[("c", &["b"]), ("a", &[]), ("b", &["a"])]);
        assert_eq!(resolve(&t).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_two_cycle() {
        let t = tools(&[("x", &["y"]), ("y", &["x"])]);
        match resolve(&t).unwrap_err() {
            Error::DependencyCycle { tools } => assert_eq!(tools, vec!["x", "y"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let t = tools(&[("a", &["a"]), ("b", &[])]);
        match resolve(&t).unwrap_err() {
            Error::DependencyCycle { tools } => assert_eq!(tools, vec!["a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_downstream_members_reported() {
        // d depends on the cycle and can never be ordered either
        let t = tools(&[("a", &[]), ("b", &["c"]), ("c", &["b"]), ("d", &["b"])]);
        match resolve(&t).unwrap_err() {
            Error::DependencyCycle { tools } => assert_eq!(tools, vec!["b", "c", "d"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let t = tools(&[("a", &["ghost@1.0"])]);
        match resolve(&t).unwrap_err() {
            Error::UnknownDependency { tool, dependency } => {
                assert_eq!(tool, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_versioned_and_duplicate_references_are_one_edge() {
        let t = tools(&[("node", &[]), ("pnpm", &["node@20", "node", "node@latest"])]);
        assert_eq!(resolve(&t).unwrap(), vec!["node", "pnpm"]);
    }

    #[test]
    fn test_ties_are_lexicographic() {
        let t = tools(&[("zsh", &[]), ("bat", &[]), ("fd", &[]), ("eza", &["zsh"])]);
        assert_eq!(resolve(&t).unwrap(), vec!["bat", "fd", "zsh", "eza"]);
    }

    #[test]
    fn test_acyclic_sets_respect_every_edge() {
        let cases = vec![
            tools(&[("a", &[]), ("b", &[]), ("c", &[])]),
            tools(&[("d", &["a", "b"]), ("a", &[]), ("b", &["a"]), ("c", &["d"])]),
            tools(&[("go", &[]), ("gopls", &["go"]), ("golangci", &["go", "gopls"])]),
            tools(&[
                ("python", &[]),
                ("uv", &["python"]),
                ("ruff", &["uv"]),
                ("node", &[]),
                ("pnpm", &["node"]),
                ("biome", &["pnpm", "node"]),
            ]),
        ];

        for t in cases {
            let order = resolve(&t).unwrap();
            assert_valid_order(&t, &order);
            // Deterministic
            assert_eq!(order, resolve(&t).unwrap());
        }
    }

    #[test]
    fn test_explicit_order_overrides_resolver() {
        let mut config = Config {
            tools: tools(&[("a", &[]), ("b", &["a"])]),
            ..Config::default()
        };
        config.tools_order = vec!["b".to_string(), "a".to_string()];
        assert_eq!(install_order(&config).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_explicit_order_unknown_tool() {
        let config = Config {
            tools_order: vec!["missing".to_string()],
            tools: tools(&[("a", &[])]),
            ..Config::default()
        };
        assert!(matches!(
            install_order(&config).unwrap_err(),
            Error::UnknownTool { .. }
        ));
    }

    #[test]
    fn test_no_explicit_order_uses_resolver() {
        let config = Config {
            tools: tools(&[("b", &["a"]), ("a", &[])]),
            ..Config::default()
        };
        assert_eq!(install_order(&config).unwrap(), vec!["a", "b"]);
    }
}

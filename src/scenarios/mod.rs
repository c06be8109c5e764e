//! Built-in demonstration scenarios
//!
//! Scenario files embedded in the binary at compile time so demonstrations
//! run with zero configuration: `livecoord simulate --scenario one-click`.

use std::path::Path;
use std::sync::LazyLock;

use crate::config::loader::{ConfigLoader, LoadResult};
use crate::error::ConfigError;

// ============================================================================
// Types
// ============================================================================

/// A built-in scenario embedded in the binary.
pub struct BuiltinScenario {
    /// Unique identifier (kebab-case, e.g., "one-click").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Tags for filtering.
    pub tags: &'static [&'static str],

    /// Raw YAML content (embedded at compile time).
    pub yaml: &'static str,
}

// ============================================================================
// Registry
// ============================================================================

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            name: "live-activation",
            description: "Thirty stakeholders acknowledging within a twelve-minute window",
            tags: &["full", "ransomware", "executive"],
            yaml: include_str!("../../scenarios/live-activation.yaml"),
        },
        BuiltinScenario {
            name: "one-click",
            description: "Eight stakeholders in twelve seconds for click-through demos",
            tags: &["short", "walkthrough"],
            yaml: include_str!("../../scenarios/one-click.yaml"),
        },
        BuiltinScenario {
            name: "investor",
            description: "Fifteen stakeholders paced over ninety seconds",
            tags: &["presentation", "supply-chain"],
            yaml: include_str!("../../scenarios/investor.yaml"),
        },
    ]
});

// ============================================================================
// Public API
// ============================================================================

/// Look up a scenario by exact name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.name == name)
}

/// List all scenarios, optionally filtered by tag.
#[must_use]
pub fn list_scenarios(tag: Option<&str>) -> Vec<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS
        .iter()
        .filter(|s| tag.is_none_or(|t| s.tags.contains(&t)))
        .collect()
}

/// Suggest a similar scenario name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
#[must_use]
pub fn suggest_scenario(input: &str) -> Option<String> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|s| (s.name, strsim::damerau_levenshtein(input, s.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Returns all scenario names in registry order.
#[must_use]
pub fn list_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|s| s.name).collect()
}

/// Resolves a `--scenario` argument: an existing file path is loaded from
/// disk, anything else is looked up among the built-ins.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownScenario`] (with a suggestion when one is
/// close) if the name matches neither, or any loader error.
pub fn resolve(name_or_path: &str, loader: &ConfigLoader) -> Result<LoadResult, ConfigError> {
    let path = Path::new(name_or_path);
    if path.is_file() {
        return loader.load(path);
    }

    find_scenario(name_or_path).map_or_else(
        || {
            Err(ConfigError::UnknownScenario {
                name: name_or_path.to_string(),
                suggestion: suggest_scenario(name_or_path),
            })
        },
        |scenario| loader.load_str(scenario.name, scenario.yaml),
    )
}

// ============================================================================
// Tests
// ============================================================================

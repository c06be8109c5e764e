//! Scenario loader
//!
//! Loading pipeline:
//! 1. Size check
//! 2. YAML parsing
//! 3. Lenient roster / task extraction (bad entries dropped with a warning)
//! 4. Deserialization to typed config
//! 5. Validation
//! 6. Freeze with `Arc`
//!
//! Stage 3 exists because scenario data only drives a demonstration: a
//! malformed roster entry should thin the roster, not abort the run.

use std::path::Path;
use std::sync::Arc;

use serde_yaml::Value;

use crate::config::schema::{RosterMember, ScenarioConfig, ScenarioTask};
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the scenario loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for scenario size.
    pub config_limits: ConfigLimits,
}

/// Limits for scenario size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of roster members.
    pub max_roster: usize,

    /// Maximum number of timeline tasks.
    pub max_tasks: usize,

    /// Maximum scenario file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_roster: env_or("LIVECOORD_MAX_ROSTER", 10_000),
            max_tasks: env_or("LIVECOORD_MAX_TASKS", 1_000),
            max_config_size: env_or("LIVECOORD_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a scenario.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated scenario.
    pub config: Arc<ScenarioConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during scenario loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Scenario loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, exceeds the size limit,
    /// fails to parse, or fails validation.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size =
            usize::try_from(metadata.len()).unwrap_or(self.options.config_limits.max_config_size);
        if file_size > self.options.config_limits.max_config_size {
            return Err(ConfigError::LimitExceeded {
                what: "file_size".to_string(),
                actual: file_size,
                limit: self.options.config_limits.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&path.display().to_string(), &raw)
    }

    /// Loads a scenario from YAML text. `source` names it in errors.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn load_str(&self, source: &str, raw: &str) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();

        if raw.len() > self.options.config_limits.max_config_size {
            return Err(ConfigError::LimitExceeded {
                what: "file_size".to_string(),
                actual: raw.len(),
                limit: self.options.config_limits.max_config_size,
            });
        }

        // Handle UTF-8 BOM
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut root: Value = serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
            path: source.into(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: source.into(),
                line: None,
                message: "Scenario file is empty".to_string(),
            });
        }

        sanitize_list::<RosterMember>(&mut root, "roster", &mut warnings);
        sanitize_list::<ScenarioTask>(&mut root, "tasks", &mut warnings);

        let mut config: ScenarioConfig =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: source.into(),
                line: None,
                message: format!("Failed to deserialize scenario: {e}"),
            })?;

        dedupe_roster(&mut config.roster, &mut warnings);

        let result = Validator::new().validate(&config, &self.options.config_limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: source.to_string(),
                errors: result.errors,
            });
        }

        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

/// Replaces `root[key]` with a sequence containing only the entries that
/// deserialize as `T`. A non-sequence value becomes an empty sequence.
fn sanitize_list<T>(root: &mut Value, key: &str, warnings: &mut Vec<LoadWarning>)
where
    T: serde::de::DeserializeOwned,
{
    let Value::Mapping(map) = root else {
        return;
    };
    let Some(entry) = map.get_mut(key) else {
        return;
    };

    let items = match std::mem::take(entry) {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        other => {
            warnings.push(LoadWarning {
                message: format!("'{key}' is not a list ({}); treating as empty", kind(&other)),
                location: Some(key.to_string()),
            });
            Vec::new()
        }
    };

    let kept = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_yaml::from_value::<T>(item.clone()) {
            Ok(_) => Some(item),
            Err(e) => {
                warnings.push(LoadWarning {
                    message: format!("dropping malformed entry: {e}"),
                    location: Some(format!("{key}[{idx}]")),
                });
                None
            }
        })
        .collect();

    *entry = Value::Sequence(kept);
}

/// Drops roster members with a blank id or an id already taken by an
/// earlier entry. The first occurrence wins.
fn dedupe_roster(roster: &mut Vec<RosterMember>, warnings: &mut Vec<LoadWarning>) {
    let mut seen = std::collections::HashSet::new();
    let mut idx = 0;
    roster.retain(|member| {
        let location = Some(format!("roster[{idx}]"));
        idx += 1;
        let id = member.id.trim();
        if id.is_empty() {
            warnings.push(LoadWarning {
                message: "dropping member with an empty id".to_string(),
                location,
            });
            false
        } else if !seen.insert(id.to_string()) {
            warnings.push(LoadWarning {
                message: format!("dropping duplicate member id '{id}'"),
                location,
            });
            false
        } else {
            true
        }
    });
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

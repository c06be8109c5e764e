//! Scenario validation
//!
//! Runs after deserialization on the typed `ScenarioConfig`. Collects all
//! issues instead of stopping at the first so `scenarios validate` can
//! report everything at once.
//!
//! Policy constants are validated strictly. Roster and task problems are
//! warnings: a demonstration with a thin roster still runs. The loader
//! drops duplicate and blank member ids before this runs.

use std::collections::HashSet;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{PhasePolicy, ScenarioConfig, SimulatorConfig};
use crate::error::{Severity, ValidationIssue};

/// Result of scenario validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scenario validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a scenario and returns the collected issues.
    pub fn validate(&mut self, config: &ScenarioConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_metadata(config);
        self.validate_policy(&config.policy);
        self.validate_simulator(&config.simulator);
        self.validate_roster(config);
        self.validate_tasks(config);
        self.validate_limits(config, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_metadata(&mut self, config: &ScenarioConfig) {
        if config.scenario.name.trim().is_empty() {
            self.add_error("scenario.name", "Scenario name is required and cannot be empty");
        }
        if config.scenario.target_completion.is_zero() {
            self.add_error(
                "scenario.target_completion",
                "Target completion window must be positive",
            );
        }
        if config.clock.tick_interval.is_zero() {
            self.add_error("clock.tick_interval", "Tick interval must be positive");
        }
    }

    fn validate_policy(&mut self, policy: &PhasePolicy) {
        self.check_ratio("policy.threshold_ratio", policy.threshold_ratio);
        self.check_ratio("policy.completing_ratio", policy.completing_ratio);
        self.check_ratio("policy.lenient_exit_ratio", policy.lenient_exit_ratio);

        if policy.completing_ratio < policy.threshold_ratio {
            self.add_error(
                "policy.completing_ratio",
                "completing_ratio must not be lower than threshold_ratio",
            );
        }
    }

    fn validate_simulator(&mut self, sim: &SimulatorConfig) {
        if !sim.enabled {
            self.add_warning(
                "simulator.enabled",
                "Fallback simulator is disabled; the run depends entirely on live events",
            );
            return;
        }
        if sim.poll_interval.is_zero() {
            self.add_error("simulator.poll_interval", "Poll interval must be positive");
        }
        if sim.catch_up_window.is_zero() {
            self.add_error(
                "simulator.catch_up_window",
                "Catch-up window must be positive",
            );
        }
        self.check_ratio("simulator.expected_ratio_cap", sim.expected_ratio_cap);
        if !(0.0..1.0).contains(&sim.behind_margin) {
            self.add_error("simulator.behind_margin", "behind_margin must be in [0, 1)");
        }
        if !(sim.jitter_min > 0.0 && sim.jitter_min.is_finite()) {
            self.add_error("simulator.jitter_min", "jitter_min must be positive");
        }
        if !sim.jitter_max.is_finite() || sim.jitter_max < sim.jitter_min {
            self.add_error(
                "simulator.jitter_max",
                "jitter_max must be finite and not lower than jitter_min",
            );
        }
    }

    fn validate_roster(&mut self, config: &ScenarioConfig) {
        if config.roster.is_empty() {
            self.add_warning(
                "roster",
                "Roster is empty; the run can only complete through a live run-complete event",
            );
            return;
        }

        let mut seen = HashSet::new();
        for (idx, member) in config.roster.iter().enumerate() {
            if member.id.trim().is_empty() {
                self.add_warning(&format!("roster[{idx}].id"), "Member id cannot be empty");
            } else if !seen.insert(member.id.as_str()) {
                self.add_warning(
                    &format!("roster[{idx}].id"),
                    &format!("Duplicate member id '{}'", member.id),
                );
            }
        }
    }

    fn validate_tasks(&mut self, config: &ScenarioConfig) {
        let target = config.target_completion_seconds();
        for (idx, task) in config.tasks.iter().enumerate() {
            match task.offset_seconds {
                None => self.add_warning(
                    &format!("tasks[{idx}].offset_seconds"),
                    &format!("Task '{}' has no usable offset and will never execute", task.id),
                ),
                Some(offset) if offset > target => self.add_warning(
                    &format!("tasks[{idx}].offset_seconds"),
                    &format!("Task '{}' executes after the target completion window", task.id),
                ),
                Some(_) => {}
            }
        }
    }

    fn validate_limits(&mut self, config: &ScenarioConfig, limits: &ConfigLimits) {
        if config.roster.len() > limits.max_roster {
            self.add_error(
                "roster",
                &format!(
                    "Roster has {} members (limit: {})",
                    config.roster.len(),
                    limits.max_roster
                ),
            );
        }
        if config.tasks.len() > limits.max_tasks {
            self.add_error(
                "tasks",
                &format!(
                    "Scenario has {} tasks (limit: {})",
                    config.tasks.len(),
                    limits.max_tasks
                ),
            );
        }
    }

    fn check_ratio(&mut self, path: &str, value: f64) {
        if !(value > 0.0 && value <= 1.0) {
            self.add_error(path, &format!("Ratio {value} must be in (0, 1]"));
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

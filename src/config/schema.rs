//! Scenario schema types
//!
//! A scenario describes one demonstration run: who is on the roster, which
//! milestone tasks reveal over time, and the policy constants that drive
//! phase transitions and fallback simulation. These types are deserialized
//! from YAML scenario files.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Top-Level Scenario
// ============================================================================

/// Root configuration for a coordination scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioConfig {
    /// Scenario metadata (required)
    pub scenario: ScenarioMetadata,

    /// Stakeholders that acknowledge during the run
    #[serde(default)]
    pub roster: Vec<RosterMember>,

    /// Milestone tasks revealed as time elapses
    #[serde(default)]
    pub tasks: Vec<ScenarioTask>,

    /// Phase transition thresholds
    #[serde(default)]
    pub policy: PhasePolicy,

    /// Fallback simulator tuning
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Clock settings for the real-time driver
    #[serde(default)]
    pub clock: ClockConfig,
}

impl ScenarioConfig {
    /// Returns the number of roster members.
    #[must_use]
    pub fn total_members(&self) -> usize {
        self.roster.len()
    }

    /// Returns the target completion window in whole seconds.
    #[must_use]
    pub const fn target_completion_seconds(&self) -> u64 {
        self.scenario.target_completion.as_secs()
    }
}

/// Scenario identification and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioMetadata {
    /// Scenario name (required)
    pub name: String,

    /// Short description shown by `scenarios list`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Window within which the run should complete
    #[serde(with = "duration_serde")]
    pub target_completion: Duration,

    /// Seed for the simulator's jitter RNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

// ============================================================================
// Roster
// ============================================================================

/// A simulated stakeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RosterMember {
    /// Stable identifier, unique within the roster
    pub id: String,

    /// Display name
    pub name: String,

    /// Role title (e.g., "Incident Commander")
    pub role: String,

    /// Department or business unit
    #[serde(default)]
    pub department: String,

    /// Escalation priority
    #[serde(default)]
    pub priority: Priority,
}

/// Escalation priority of a roster member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Must acknowledge for the playbook to proceed
    Critical,
    /// Expected early in the run
    High,
    /// Everyone else
    #[default]
    Medium,
}

// ============================================================================
// Tasks
// ============================================================================

/// A scripted milestone revealed once elapsed time passes its offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioTask {
    /// Task identifier
    pub id: String,

    /// Seconds after run start at which the task executes.
    ///
    /// Absent or malformed offsets deserialize to `None`, meaning the task
    /// never executes.
    #[serde(
        default,
        deserialize_with = "lenient_offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub offset_seconds: Option<u64>,

    /// Kind of entry on the timeline
    #[serde(default)]
    pub kind: TaskKind,

    /// Short title
    pub title: String,

    /// Longer description
    #[serde(default)]
    pub description: String,
}

/// Kind of timeline entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A human task from the playbook
    #[default]
    Task,
    /// An automated system action
    System,
    /// A milestone marker
    Milestone,
}

/// Accepts integers, non-negative floats, numeric strings and humantime
/// strings (`"2m"`). Anything else becomes `None`.
fn lenient_offset<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(offset_from_value))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn offset_from_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.floor() as u64)
        }),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| humantime::parse_duration(s).ok().map(|d| d.as_secs()))
        }
        _ => None,
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Phase transition thresholds.
///
/// The lenient exit lets a run finish at `lenient_exit_ratio` once the target
/// window has elapsed rather than waiting on the last stragglers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PhasePolicy {
    /// Ratio at which `running` becomes `threshold`
    pub threshold_ratio: f64,

    /// Ratio at which `threshold` becomes `completing`
    pub completing_ratio: f64,

    /// Minimum ratio for the time-based exit to `complete`
    pub lenient_exit_ratio: f64,

    /// Complete as soon as every roster member has acknowledged, without
    /// waiting for the target. Off unless a scenario opts in.
    pub complete_on_full_roster: bool,
}

impl PhasePolicy {
    /// Default `running → threshold` ratio.
    pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.80;
    /// Default `threshold → completing` ratio.
    pub const DEFAULT_COMPLETING_RATIO: f64 = 0.90;
    /// Default floor for the time-based exit.
    pub const DEFAULT_LENIENT_EXIT_RATIO: f64 = 0.80;
}

impl Default for PhasePolicy {
    fn default() -> Self {
        Self {
            threshold_ratio: Self::DEFAULT_THRESHOLD_RATIO,
            completing_ratio: Self::DEFAULT_COMPLETING_RATIO,
            lenient_exit_ratio: Self::DEFAULT_LENIENT_EXIT_RATIO,
            complete_on_full_roster: false,
        }
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Fallback simulator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SimulatorConfig {
    /// Disable to rely on the live transport only
    pub enabled: bool,

    /// How long an empty ledger is tolerated before full simulation starts
    #[serde(with = "duration_serde")]
    pub cold_start_grace: Duration,

    /// Interval between stall / behind-curve checks
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Window over which make-up acknowledgments are spread
    #[serde(with = "duration_serde")]
    pub catch_up_window: Duration,

    /// How far below the expected curve counts as behind
    pub behind_margin: f64,

    /// Upper bound of the expected progress curve
    pub expected_ratio_cap: f64,

    /// Lower bound of the per-acknowledgment delay jitter
    pub jitter_min: f64,

    /// Upper bound of the per-acknowledgment delay jitter
    pub jitter_max: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cold_start_grace: Duration::from_secs(8),
            poll_interval: Duration::from_secs(10),
            catch_up_window: Duration::from_secs(15),
            behind_margin: 0.20,
            expected_ratio_cap: 0.90,
            jitter_min: 0.7,
            jitter_max: 1.2,
        }
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Real-time driver clock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ClockConfig {
    /// Interval between elapsed-time samples
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

/// Serializes durations as humantime strings (`"8s"`, `"12m"`) and accepts
/// either humantime strings or plain integer seconds.
pub mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    /// Serializes a duration as a humantime string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Deserializes a duration from a humantime string or integer seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid humantime duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| serde::de::Error::custom(format!("invalid duration '{text}': {e}"))),
        }
    }
}

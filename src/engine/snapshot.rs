//! Read-only run snapshot for presentation layers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::schema::{Priority, ScenarioConfig, TaskKind};
use crate::engine::ledger::{AckLedger, Origin};
use crate::engine::phase::Phase;
use crate::engine::run::{RunId, RunState};
use crate::engine::timeline::TaskTimeline;

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Scenario name
    pub scenario: String,
    /// Active run, `None` when idle
    pub run_id: Option<RunId>,
    /// Phase of the active run, `None` when idle
    pub phase: Option<Phase>,
    pub elapsed_seconds: u64,
    pub ratio: f64,
    pub acknowledged: usize,
    pub total_members: usize,
    pub target_completion_seconds: u64,
    /// Simulated acknowledgments scheduled but not yet fired
    pub pending_simulated: usize,
    /// Accepted acknowledgments in arrival order
    pub ledger_snapshot: Vec<LedgerEntry>,
    /// Ids of executed tasks in scenario order
    pub task_execution_set: Vec<String>,
    /// Every task with its execution flag
    pub tasks: Vec<TaskView>,
}

/// Ledger record joined with its roster entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub member_id: String,
    pub name: String,
    pub role: String,
    pub department: String,
    pub priority: Priority,
    pub acknowledged_at: DateTime<Utc>,
    pub response_time_seconds: u64,
    pub origin: Origin,
}

/// Timeline entry with its execution flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub kind: TaskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_seconds: Option<u64>,
    pub executed: bool,
}

impl Snapshot {
    pub(crate) fn idle(scenario: &ScenarioConfig) -> Self {
        Self {
            scenario: scenario.scenario.name.clone(),
            run_id: None,
            phase: None,
            elapsed_seconds: 0,
            ratio: 0.0,
            acknowledged: 0,
            total_members: scenario.total_members(),
            target_completion_seconds: scenario.target_completion_seconds(),
            pending_simulated: 0,
            ledger_snapshot: Vec::new(),
            task_execution_set: Vec::new(),
            tasks: scenario
                .tasks
                .iter()
                .map(|t| TaskView {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    kind: t.kind,
                    offset_seconds: t.offset_seconds,
                    executed: false,
                })
                .collect(),
        }
    }

    pub(crate) fn capture(
        scenario: &ScenarioConfig,
        state: &RunState,
        ledger: &AckLedger,
        timeline: &TaskTimeline,
        pending_simulated: usize,
    ) -> Self {
        let ledger_snapshot = ledger
            .iter()
            .filter_map(|record| {
                let member = scenario
                    .roster
                    .iter()
                    .find(|m| m.id == record.member.as_str())?;
                Some(LedgerEntry {
                    member_id: member.id.clone(),
                    name: member.name.clone(),
                    role: member.role.clone(),
                    department: member.department.clone(),
                    priority: member.priority,
                    acknowledged_at: record.acknowledged_at,
                    response_time_seconds: record.response_time_seconds,
                    origin: record.origin,
                })
            })
            .collect();

        Self {
            scenario: scenario.scenario.name.clone(),
            run_id: Some(state.run_id.clone()),
            phase: Some(state.phase),
            elapsed_seconds: state.elapsed.as_secs(),
            ratio: ledger.ratio(),
            acknowledged: ledger.size(),
            total_members: state.total_members,
            target_completion_seconds: state.target_completion.as_secs(),
            pending_simulated,
            ledger_snapshot,
            task_execution_set: timeline.executed_ids(),
            tasks: timeline
                .iter()
                .map(|(t, executed)| TaskView {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    kind: t.kind,
                    offset_seconds: t.offset_seconds,
                    executed,
                })
                .collect(),
        }
    }

    /// Whether a run is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.run_id.is_some()
    }

    /// Acknowledgments per origin as `(live, simulated)`.
    #[must_use]
    pub fn origin_counts(&self) -> (usize, usize) {
        self.ledger_snapshot
            .iter()
            .fold((0, 0), |(live, sim), e| match e.origin {
                Origin::Live => (live + 1, sim),
                Origin::Simulated => (live, sim + 1),
            })
    }

    /// Mean response time in seconds over all acknowledgments.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_response_seconds(&self) -> Option<f64> {
        if self.ledger_snapshot.is_empty() {
            return None;
        }
        let total: u64 = self
            .ledger_snapshot
            .iter()
            .map(|e| e.response_time_seconds)
            .sum();
        Some(total as f64 / self.ledger_snapshot.len() as f64)
    }
}

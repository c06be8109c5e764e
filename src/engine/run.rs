//! Run coordinator
//!
//! [`Coordinator`] owns at most one active run and advances it in discrete
//! ticks. Each tick, in order:
//!
//! 1. clamp elapsed time so it never goes backwards
//! 2. fire due simulated acknowledgments into the ledger
//! 3. evaluate phase transitions (cascading)
//! 4. execute due timeline tasks
//! 5. poll the fallback simulator, or cancel its timers if complete
//!
//! The coordinator is synchronous and owns no timers of its own; the
//! real-time driver in [`crate::session`] and the virtual clock used by
//! `simulate` feed it elapsed samples.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::schema::{RosterMember, ScenarioConfig};
use crate::engine::ledger::{AckLedger, AcknowledgmentRecord, MemberKey, Origin};
use crate::engine::phase::{Phase, PhaseMachine, PhaseTransition, TransitionReason};
use crate::engine::simulator::{FallbackSimulator, ScheduledBatch, SimulatorInput};
use crate::engine::snapshot::Snapshot;
use crate::engine::timeline::TaskTimeline;
use crate::error::EngineError;
use crate::observability::metrics;
use crate::transport::LiveEvent;

// ============================================================================
// Identity
// ============================================================================

/// Execution id of a run, as returned by the activation backend.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful activation: the run id and its start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    /// Execution id
    pub execution_id: RunId,
    /// Coordination start time reported by the backend
    pub start_time: DateTime<Utc>,
}

/// Observable state of the active run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: RunId,
    pub start_time: DateTime<Utc>,
    #[serde(with = "crate::config::schema::duration_serde")]
    pub elapsed: Duration,
    pub phase: Phase,
    pub total_members: usize,
    #[serde(with = "crate::config::schema::duration_serde")]
    pub target_completion: Duration,
}

// ============================================================================
// Reports
// ============================================================================

/// Everything that changed during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Run that was ticked, `None` when idle
    pub run_id: Option<RunId>,
    /// Clamped elapsed time used for the tick
    pub elapsed: Duration,
    /// Phase after the tick
    pub phase: Option<Phase>,
    /// Ledger ratio after the tick
    pub ratio: f64,
    /// Simulated acknowledgments accepted this tick
    pub acknowledged: Vec<AcknowledgmentRecord>,
    /// Phase transitions fired this tick
    pub transitions: Vec<PhaseTransition>,
    /// Task ids newly executed this tick
    pub executed_tasks: Vec<String>,
    /// Simulator batches scheduled this tick
    pub scheduled: Vec<ScheduledBatch>,
    /// Pending simulated acknowledgments cancelled on completion
    pub cancelled_timers: usize,
}

impl TickReport {
    /// Whether this tick moved the run into [`Phase::Complete`].
    #[must_use]
    pub fn completed(&self) -> bool {
        self.transitions.iter().any(|t| t.to == Phase::Complete)
    }
}

/// What happened to one live event.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveOutcome {
    /// Recorded in the ledger
    Accepted(AcknowledgmentRecord),
    /// Member had already acknowledged
    Duplicate(MemberKey),
    /// Event named nobody on the roster
    UnknownMember,
    /// Run-complete event moved the run to complete
    Completed {
        transition: PhaseTransition,
        cancelled_timers: usize,
    },
    /// Run was already complete
    Ignored,
}

/// Summary of a discarded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    pub run_id: RunId,
    pub acknowledged: usize,
    pub cancelled_timers: usize,
}

// ============================================================================
// Coordinator
// ============================================================================

struct Run {
    state: RunState,
    ledger: AckLedger,
    phase: PhaseMachine,
    timeline: TaskTimeline,
    simulator: FallbackSimulator,
}

/// Owns the scenario and at most one active run.
pub struct Coordinator {
    scenario: Arc<ScenarioConfig>,
    roster_keys: Arc<[MemberKey]>,
    seed: u64,
    run: Option<Run>,
}

impl Coordinator {
    /// Creates an idle coordinator. The jitter seed comes from the scenario,
    /// or is drawn at random when the scenario has none.
    #[must_use]
    pub fn new(scenario: Arc<ScenarioConfig>) -> Self {
        let seed = scenario.scenario.seed.unwrap_or_else(rand::random);
        Self::with_seed(scenario, seed)
    }

    /// Creates an idle coordinator with an explicit jitter seed.
    #[must_use]
    pub fn with_seed(scenario: Arc<ScenarioConfig>, seed: u64) -> Self {
        let roster_keys = scenario
            .roster
            .iter()
            .map(|m| MemberKey::new(m.id.as_str()))
            .collect();
        Self {
            scenario,
            roster_keys,
            seed,
            run: None,
        }
    }

    #[must_use]
    pub fn scenario(&self) -> &Arc<ScenarioConfig> {
        &self.scenario
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// State of the active run, if any.
    #[must_use]
    pub fn run_state(&self) -> Option<&RunState> {
        self.run.as_ref().map(|r| &r.state)
    }

    /// Id of the active run, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<&RunId> {
        self.run.as_ref().map(|r| &r.state.run_id)
    }

    /// Pending simulated acknowledgments of the active run.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.run.as_ref().map_or(0, |r| r.simulator.pending())
    }

    /// Starts a run, discarding any run that is still active.
    pub fn start(&mut self, activation: Activation) -> &RunState {
        if let Some(report) = self.reset() {
            tracing::info!(
                run_id = %report.run_id,
                "discarding previous run before start"
            );
        }

        let total_members = self.scenario.total_members();
        let target_completion = self.scenario.scenario.target_completion;

        tracing::info!(
            run_id = %activation.execution_id,
            scenario = %self.scenario.scenario.name,
            total_members,
            target_secs = target_completion.as_secs(),
            seed = self.seed,
            "run started"
        );
        metrics::record_run_started();
        metrics::set_ack_ratio(0.0);

        let run = self.run.insert(Run {
            ledger: AckLedger::new(total_members, activation.start_time),
            phase: PhaseMachine::new(self.scenario.policy),
            timeline: TaskTimeline::new(&self.scenario.tasks),
            simulator: FallbackSimulator::new(self.scenario.simulator, self.seed),
            state: RunState {
                run_id: activation.execution_id,
                start_time: activation.start_time,
                elapsed: Duration::ZERO,
                phase: Phase::Running,
                total_members,
                target_completion,
            },
        });
        &run.state
    }

    /// Advances the active run to `sample`. Idle coordinators return an
    /// empty report.
    pub fn tick(&mut self, sample: Duration) -> TickReport {
        let Some(run) = self.run.as_mut() else {
            return TickReport::default();
        };

        let elapsed = run.state.elapsed.max(sample);
        run.state.elapsed = elapsed;

        let mut report = TickReport {
            run_id: Some(run.state.run_id.clone()),
            elapsed,
            ..TickReport::default()
        };

        if !run.state.phase.is_terminal() {
            for ack in run.simulator.fire_due(elapsed) {
                let at = run.state.start_time + delta(ack.due);
                if let Some(record) = run.ledger.try_record(ack.member, at, Origin::Simulated) {
                    metrics::record_acknowledgment(Origin::Simulated, record.response_time_seconds);
                    report.acknowledged.push(record);
                } else {
                    metrics::record_duplicate(Origin::Simulated);
                }
            }

            let ratio = run.ledger.ratio();
            for transition in run.phase.evaluate(ratio, elapsed, run.state.target_completion) {
                log_transition(&run.state.run_id, &transition, ratio);
                report.transitions.push(transition);
            }
            run.state.phase = run.phase.current();
        }

        report.executed_tasks = run.timeline.evaluate(elapsed);
        for id in &report.executed_tasks {
            tracing::debug!(run_id = %run.state.run_id, task = %id, "task executed");
        }

        if run.state.phase.is_terminal() {
            report.cancelled_timers = run.simulator.cancel_all();
        } else {
            report.scheduled = run.simulator.poll(SimulatorInput {
                elapsed,
                target: run.state.target_completion,
                ledger: &run.ledger,
                roster: &self.roster_keys,
            });
            for batch in &report.scheduled {
                metrics::record_simulated_batch(batch.kind.as_str(), batch.count);
            }
        }

        report.ratio = run.ledger.ratio();
        report.phase = Some(run.state.phase);
        metrics::set_ack_ratio(report.ratio);
        report
    }

    /// Applies an event from the live transport to the run it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoActiveRun`] when idle, or
    /// [`EngineError::RunMismatch`] if `run_id` is not the active run.
    pub fn apply_live(
        &mut self,
        run_id: &RunId,
        event: &LiveEvent,
    ) -> Result<LiveOutcome, EngineError> {
        let run = self.run.as_mut().ok_or(EngineError::NoActiveRun)?;
        if &run.state.run_id != run_id {
            return Err(EngineError::RunMismatch {
                got: run_id.to_string(),
                active: run.state.run_id.to_string(),
            });
        }

        run.simulator.note_live_event();
        if run.state.phase.is_terminal() {
            return Ok(LiveOutcome::Ignored);
        }

        match event {
            LiveEvent::MemberAcknowledged {
                member_id,
                member_name,
                member_role,
                acknowledged_at,
                total_stakeholders,
            } => {
                if let Some(reported) = total_stakeholders
                    && *reported != run.state.total_members
                {
                    tracing::debug!(
                        reported,
                        roster = run.state.total_members,
                        "live event disagrees on roster size"
                    );
                }

                let Some(member) = resolve_member(
                    &self.scenario.roster,
                    member_id.as_deref(),
                    member_name.as_deref(),
                    member_role.as_deref(),
                ) else {
                    tracing::debug!(
                        run_id = %run.state.run_id,
                        member_id = ?member_id,
                        member_name = ?member_name,
                        "live acknowledgment for unknown member dropped"
                    );
                    metrics::record_unknown_member();
                    return Ok(LiveOutcome::UnknownMember);
                };

                let at = acknowledged_at
                    .unwrap_or_else(|| run.state.start_time + delta(run.state.elapsed));
                if let Some(record) = run.ledger.try_record(member.clone(), at, Origin::Live) {
                    metrics::record_acknowledgment(Origin::Live, record.response_time_seconds);
                    tracing::debug!(run_id = %run.state.run_id, member = %member, "live acknowledgment");
                    Ok(LiveOutcome::Accepted(record))
                } else {
                    metrics::record_duplicate(Origin::Live);
                    Ok(LiveOutcome::Duplicate(member))
                }
            }
            LiveEvent::RunComplete { .. } => {
                let Some(transition) = run.phase.complete(TransitionReason::RunCompleteEvent)
                else {
                    return Ok(LiveOutcome::Ignored);
                };
                run.state.phase = run.phase.current();
                log_transition(&run.state.run_id, &transition, run.ledger.ratio());
                let cancelled_timers = run.simulator.cancel_all();
                Ok(LiveOutcome::Completed {
                    transition,
                    cancelled_timers,
                })
            }
        }
    }

    /// Discards the active run and cancels its pending simulated
    /// acknowledgments. Returns `None` when already idle.
    pub fn reset(&mut self) -> Option<ResetReport> {
        let mut run = self.run.take()?;
        let report = ResetReport {
            run_id: run.state.run_id.clone(),
            acknowledged: run.ledger.size(),
            cancelled_timers: run.simulator.cancel_all(),
        };
        tracing::info!(
            run_id = %report.run_id,
            acknowledged = report.acknowledged,
            cancelled_timers = report.cancelled_timers,
            "run reset"
        );
        metrics::record_run_reset();
        metrics::set_ack_ratio(0.0);
        Some(report)
    }

    /// Read-only view for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        match &self.run {
            None => Snapshot::idle(&self.scenario),
            Some(run) => Snapshot::capture(
                &self.scenario,
                &run.state,
                &run.ledger,
                &run.timeline,
                run.simulator.pending(),
            ),
        }
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("scenario", &self.scenario.scenario.name)
            .field("seed", &self.seed)
            .field("run", &self.run_state())
            .finish_non_exhaustive()
    }
}

/// Resolves a live event to a roster member: by id, then name, then role.
fn resolve_member(
    roster: &[RosterMember],
    id: Option<&str>,
    name: Option<&str>,
    role: Option<&str>,
) -> Option<MemberKey> {
    find_by(roster, id, |m| m.id.as_str())
        .or_else(|| find_by(roster, name, |m| m.name.as_str()))
        .or_else(|| find_by(roster, role, |m| m.role.as_str()))
        .map(|m| MemberKey::new(m.id.as_str()))
}

fn find_by<'a>(
    roster: &'a [RosterMember],
    value: Option<&str>,
    field: fn(&RosterMember) -> &str,
) -> Option<&'a RosterMember> {
    let value = value.filter(|v| !v.is_empty())?;
    roster.iter().find(|m| field(m) == value)
}

fn log_transition(run_id: &RunId, transition: &PhaseTransition, ratio: f64) {
    tracing::info!(
        run_id = %run_id,
        from = %transition.from,
        to = %transition.to,
        reason = %transition.reason,
        ratio,
        "phase transition"
    );
    metrics::record_phase_transition(transition.from.as_str(), transition.to.as_str());
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or_else(|_| TimeDelta::zero())
}

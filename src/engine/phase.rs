//! Coordination phase state machine
//!
//! `running → threshold → completing → complete`, driven by the ledger ratio
//! and elapsed time. Phases never move backwards within a run.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::schema::PhasePolicy;

/// Coordination phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting on acknowledgments
    Running,
    /// Quorum reached
    Threshold,
    /// Almost everyone is in
    Completing,
    /// Terminal
    Complete,
}

impl Phase {
    /// Returns the lowercase phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Threshold => "threshold",
            Self::Completing => "completing",
            Self::Complete => "complete",
        }
    }

    /// Whether the run has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Ratio crossed the configured threshold for the next phase
    RatioReached,
    /// Every roster member acknowledged
    FullRoster,
    /// Target window elapsed with enough acknowledgments
    TargetElapsed,
    /// The live transport reported the run complete
    RunCompleteEvent,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RatioReached => "ratio_reached",
            Self::FullRoster => "full_roster",
            Self::TargetElapsed => "target_elapsed",
            Self::RunCompleteEvent => "run_complete_event",
        })
    }
}

/// A single phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    /// Phase left
    pub from: Phase,
    /// Phase entered
    pub to: Phase,
    /// Trigger
    pub reason: TransitionReason,
}

/// Monotonic phase machine for one run.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    policy: PhasePolicy,
    current: Phase,
}

impl PhaseMachine {
    /// Creates a machine in [`Phase::Running`].
    #[must_use]
    pub const fn new(policy: PhasePolicy) -> Self {
        Self {
            policy,
            current: Phase::Running,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn current(&self) -> Phase {
        self.current
    }

    /// Evaluates the policy against the current ratio and elapsed time.
    ///
    /// Every satisfied step fires in one evaluation, so a ratio that jumps
    /// from 0.5 to 0.95 yields `running → threshold → completing`. Completion
    /// rules are checked first and jump straight to [`Phase::Complete`].
    pub fn evaluate(
        &mut self,
        ratio: f64,
        elapsed: Duration,
        target: Duration,
    ) -> Vec<PhaseTransition> {
        if self.current.is_terminal() {
            return Vec::new();
        }

        if self.policy.complete_on_full_roster && ratio >= 1.0 {
            return self.complete(TransitionReason::FullRoster).into_iter().collect();
        }
        if elapsed >= target && ratio >= self.policy.lenient_exit_ratio {
            return self
                .complete(TransitionReason::TargetElapsed)
                .into_iter()
                .collect();
        }

        let mut transitions = Vec::new();
        loop {
            let next = match self.current {
                Phase::Running if ratio >= self.policy.threshold_ratio => Phase::Threshold,
                Phase::Threshold if ratio >= self.policy.completing_ratio => Phase::Completing,
                _ => break,
            };
            transitions.push(self.enter(next, TransitionReason::RatioReached));
        }
        transitions
    }

    /// Jumps to [`Phase::Complete`] from any non-terminal phase.
    ///
    /// Returns `None` if the run is already complete.
    pub fn complete(&mut self, reason: TransitionReason) -> Option<PhaseTransition> {
        if self.current.is_terminal() {
            None
        } else {
            Some(self.enter(Phase::Complete, reason))
        }
    }

    fn enter(&mut self, to: Phase, reason: TransitionReason) -> PhaseTransition {
        let from = self.current;
        self.current = to;
        PhaseTransition { from, to, reason }
    }
}

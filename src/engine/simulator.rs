//! Fallback acknowledgment simulator
//!
//! Keeps a demonstration moving when the live transport is silent or slow.
//! Two triggers, both evaluated from the coordinator's tick:
//!
//! - **Cold start**: the ledger is still empty once `cold_start_grace` has
//!   elapsed and no live event was ever seen. Every unacknowledged member is
//!   scheduled with `delay_i = base · i · jitter`, where
//!   `base = remaining / (n · jitter_max)` so the last arrival lands inside
//!   the remaining target window.
//! - **Stall correction**: every `poll_interval`, if the ledger did not grow
//!   since the previous check or sits more than `behind_margin` below the
//!   linear curve `min(cap, elapsed / target)`, enough additional members are
//!   scheduled over `catch_up_window` to close the gap.
//!
//! Timers are plain entries in a [`TimerArena`] owned by the run. Dropping
//! or clearing the arena is the whole cancellation story: nothing fires for
//! a run that no longer exists.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::schema::SimulatorConfig;
use crate::engine::ledger::{AckLedger, MemberKey};

// ============================================================================
// Timer arena
// ============================================================================

/// Which trigger scheduled a simulated acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Nothing arrived within the grace period
    ColdStart,
    /// Progress stalled or fell behind the expected curve
    CatchUp,
}

impl BatchKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ColdStart => "cold_start",
            Self::CatchUp => "catch_up",
        }
    }
}

/// A simulated acknowledgment waiting for its due time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAck {
    /// Member to acknowledge
    pub member: MemberKey,
    /// Elapsed run time at which it fires
    pub due: Duration,
    /// Trigger that scheduled it
    pub batch: BatchKind,
}

/// Ordered store of pending simulated acknowledgments, keyed by due time.
///
/// At most one pending entry exists per member.
#[derive(Debug, Default)]
pub struct TimerArena {
    entries: BTreeMap<(Duration, u64), PendingAck>,
    pending: HashSet<MemberKey>,
    next_seq: u64,
}

impl TimerArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `member` at `due`. Returns `false` if it is already pending.
    pub fn schedule(&mut self, member: MemberKey, due: Duration, batch: BatchKind) -> bool {
        if !self.pending.insert(member.clone()) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((due, seq), PendingAck { member, due, batch });
        true
    }

    /// Removes and returns every entry due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Duration) -> Vec<PendingAck> {
        let mut fired = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ack = entry.remove();
            self.pending.remove(&ack.member);
            fired.push(ack);
        }
        fired
    }

    /// Drops every pending entry and returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.entries.len();
        self.entries.clear();
        self.pending.clear();
        cancelled
    }

    #[must_use]
    pub fn is_pending(&self, member: &MemberKey) -> bool {
        self.pending.contains(member)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Due time of the earliest pending entry.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.keys().next().map(|(due, _)| *due)
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// A batch of simulated acknowledgments scheduled in one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledBatch {
    /// Trigger
    pub kind: BatchKind,
    /// Members scheduled
    pub count: usize,
    /// Elapsed time when scheduled
    #[serde(with = "crate::config::schema::duration_serde")]
    pub at: Duration,
}

/// What the simulator sees on each poll.
#[derive(Debug, Clone, Copy)]
pub struct SimulatorInput<'a> {
    /// Elapsed run time
    pub elapsed: Duration,
    /// Target completion window
    pub target: Duration,
    /// Current ledger
    pub ledger: &'a AckLedger,
    /// Roster keys in scenario order
    pub roster: &'a [MemberKey],
}

/// Per-run fallback simulator.
#[derive(Debug)]
pub struct FallbackSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    timers: TimerArena,
    cold_started: bool,
    live_seen: bool,
    last_check: Duration,
    last_check_size: usize,
}

impl FallbackSimulator {
    /// Creates a simulator with a deterministic jitter source.
    #[must_use]
    pub fn new(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            timers: TimerArena::new(),
            cold_started: false,
            live_seen: false,
            last_check: Duration::ZERO,
            last_check_size: 0,
        }
    }

    /// Records that the live transport delivered something, which rules out
    /// the cold-start trigger for the rest of the run.
    pub const fn note_live_event(&mut self) {
        self.live_seen = true;
    }

    /// Removes and returns simulated acknowledgments due at `now`.
    pub fn fire_due(&mut self, now: Duration) -> Vec<PendingAck> {
        self.timers.drain_due(now)
    }

    /// Cancels every pending simulated acknowledgment.
    pub fn cancel_all(&mut self) -> usize {
        self.timers.cancel_all()
    }

    /// Number of pending simulated acknowledgments.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Whether the cold-start batch has been scheduled.
    #[must_use]
    pub const fn cold_started(&self) -> bool {
        self.cold_started
    }

    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    /// Evaluates both triggers and schedules whatever they call for.
    pub fn poll(&mut self, input: SimulatorInput<'_>) -> Vec<ScheduledBatch> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut batches = Vec::new();
        if let Some(batch) = self.maybe_cold_start(input) {
            batches.push(batch);
        }
        if let Some(batch) = self.maybe_catch_up(input) {
            batches.push(batch);
        }
        batches
    }

    fn maybe_cold_start(&mut self, input: SimulatorInput<'_>) -> Option<ScheduledBatch> {
        if self.cold_started
            || self.live_seen
            || !input.ledger.is_empty()
            || input.elapsed < self.config.cold_start_grace
        {
            return None;
        }
        self.cold_started = true;

        let candidates = self.candidates(input);
        if candidates.is_empty() {
            return None;
        }

        let mut window = input.target.saturating_sub(input.elapsed);
        if window.is_zero() {
            window = self.config.catch_up_window;
        }
        #[allow(clippy::cast_precision_loss)]
        let base = window.as_secs_f64() / (candidates.len() as f64 * self.config.jitter_max);

        let count = candidates.len();
        for (i, member) in candidates.into_iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let delay = base * (i + 1) as f64 * self.jitter();
            let due = input.elapsed + secs(delay, window);
            self.timers.schedule(member, due, BatchKind::ColdStart);
        }

        tracing::info!(
            count,
            window_secs = window.as_secs(),
            "ledger still empty after grace period; simulating full roster"
        );
        Some(ScheduledBatch {
            kind: BatchKind::ColdStart,
            count,
            at: input.elapsed,
        })
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn maybe_catch_up(&mut self, input: SimulatorInput<'_>) -> Option<ScheduledBatch> {
        if input.elapsed < self.last_check + self.config.poll_interval {
            return None;
        }
        self.last_check = input.elapsed;

        let size = input.ledger.size();
        let total = input.ledger.capacity();
        let stalled = size <= self.last_check_size;
        self.last_check_size = size;

        if total == 0 || size >= total {
            return None;
        }

        let target_secs = input.target.as_secs_f64().max(f64::EPSILON);
        let expected = (input.elapsed.as_secs_f64() / target_secs).min(self.config.expected_ratio_cap);
        let behind = input.ledger.ratio() < expected - self.config.behind_margin;
        if !stalled && !behind {
            return None;
        }

        let expected_count = (expected * total as f64).ceil() as usize;
        let mut needed = expected_count.saturating_sub(size + self.timers.len());
        if stalled {
            needed = needed.max(1);
        }

        let chosen: Vec<MemberKey> = self.candidates(input).into_iter().take(needed).collect();
        if chosen.is_empty() {
            return None;
        }

        let window = self.config.catch_up_window;
        let count = chosen.len();
        for (k, member) in chosen.into_iter().enumerate() {
            let fraction = (k + 1) as f64 / count as f64;
            let delay = window.as_secs_f64() * fraction * self.jitter() / self.config.jitter_max;
            let due = input.elapsed + secs(delay, window);
            self.timers.schedule(member, due, BatchKind::CatchUp);
        }

        tracing::debug!(
            count,
            stalled,
            behind,
            size,
            expected,
            "scheduling catch-up acknowledgments"
        );
        Some(ScheduledBatch {
            kind: BatchKind::CatchUp,
            count,
            at: input.elapsed,
        })
    }

    /// Roster members that are neither acknowledged nor already pending.
    fn candidates(&self, input: SimulatorInput<'_>) -> Vec<MemberKey> {
        input
            .roster
            .iter()
            .filter(|m| !input.ledger.contains(m) && !self.timers.is_pending(m))
            .cloned()
            .collect()
    }

    fn jitter(&mut self) -> f64 {
        let (lo, hi) = (self.config.jitter_min, self.config.jitter_max);
        if hi > lo {
            self.rng.random_range(lo..=hi)
        } else {
            lo
        }
    }
}

/// Converts seconds to a `Duration`, clamped to `max`.
fn secs(value: f64, max: Duration) -> Duration {
    Duration::try_from_secs_f64(value).map_or(max, |d| d.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger::Origin;
    use chrono::{DateTime, Utc};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn roster(n: usize) -> Vec<MemberKey> {
        (0..n).map(|i| MemberKey::new(format!("m{i}"))).collect()
    }

    fn config() -> SimulatorConfig {
        SimulatorConfig::default()
    }

    fn input<'a>(
        elapsed: u64,
        target: u64,
        ledger: &'a AckLedger,
        roster: &'a [MemberKey],
    ) -> SimulatorInput<'a> {
        SimulatorInput {
            elapsed: Duration::from_secs(elapsed),
            target: Duration::from_secs(target),
            ledger,
            roster,
        }
    }

    #[test]
    fn test_arena_orders_by_due() {
        let mut arena = TimerArena::new();
        arena.schedule(MemberKey::new("late"), Duration::from_secs(9), BatchKind::CatchUp);
        arena.schedule(MemberKey::new("early"), Duration::from_secs(3), BatchKind::CatchUp);
        assert_eq!(arena.next_due(), Some(Duration::from_secs(3)));

        let fired = arena.drain_due(Duration::from_secs(5));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].member.as_str(), "early");
        assert!(!arena.is_pending(&MemberKey::new("early")));
        assert!(arena.is_pending(&MemberKey::new("late")));
    }

    #[test]
    fn test_arena_one_entry_per_member() {
        let mut arena = TimerArena::new();
        assert!(arena.schedule(MemberKey::new("a"), Duration::from_secs(1), BatchKind::ColdStart));
        assert!(!arena.schedule(MemberKey::new("a"), Duration::from_secs(2), BatchKind::CatchUp));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_arena_cancel_all() {
        let mut arena = TimerArena::new();
        arena.schedule(MemberKey::new("a"), Duration::from_secs(1), BatchKind::ColdStart);
        arena.schedule(MemberKey::new("b"), Duration::from_secs(2), BatchKind::ColdStart);
        assert_eq!(arena.cancel_all(), 2);
        assert!(arena.is_empty());
        assert!(arena.drain_due(Duration::MAX).is_empty());
    }

    #[test]
    fn test_no_cold_start_before_grace() {
        let ledger = AckLedger::new(30, t0());
        let roster = roster(30);
        let mut sim = FallbackSimulator::new(config(), 1);
        assert!(sim.poll(input(7, 720, &ledger, &roster)).is_empty());
        assert_eq!(sim.pending(), 0);
    }

    #[test]
    fn test_cold_start_schedules_everyone_within_window() {
        let ledger = AckLedger::new(30, t0());
        let roster = roster(30);
        let mut sim = FallbackSimulator::new(config(), 1);
        let batches = sim.poll(input(8, 720, &ledger, &roster));
        assert_eq!(batches[0].kind, BatchKind::ColdStart);
        assert_eq!(batches[0].count, 30);
        assert_eq!(sim.pending(), 30);

        let fired = sim.fire_due(Duration::from_secs(720));
        assert_eq!(fired.len(), 30);
        assert!(fired.iter().all(|a| a.due > Duration::from_secs(8)));
    }

    #[test]
    fn test_cold_start_fires_once() {
        let ledger = AckLedger::new(4, t0());
        let roster = roster(4);
        let mut sim = FallbackSimulator::new(config(), 1);
        sim.poll(input(8, 60, &ledger, &roster));
        sim.fire_due(Duration::MAX);
        assert!(sim.cold_started());
        let batches = sim.poll(input(9, 60, &ledger, &roster));
        assert!(batches.iter().all(|b| b.kind != BatchKind::ColdStart));
    }

    #[test]
    fn test_live_event_suppresses_cold_start() {
        let ledger = AckLedger::new(30, t0());
        let roster = roster(30);
        let mut sim = FallbackSimulator::new(config(), 1);
        sim.note_live_event();
        let batches = sim.poll(input(8, 720, &ledger, &roster));
        assert!(batches.is_empty());
    }

    #[test]
    fn test_cold_start_past_target_uses_catch_up_window() {
        let ledger = AckLedger::new(3, t0());
        let roster = roster(3);
        let mut sim = FallbackSimulator::new(config(), 1);
        sim.poll(input(100, 60, &ledger, &roster));
        let last = sim.fire_due(Duration::MAX).pop().unwrap();
        assert!(last.due <= Duration::from_secs(100) + config().catch_up_window);
    }

    #[test]
    fn test_stall_schedules_at_least_one() {
        let mut ledger = AckLedger::new(30, t0());
        ledger.record(MemberKey::new("m0"), t0(), Origin::Live);
        let roster = roster(30);
        let mut sim = FallbackSimulator::new(config(), 1);
        sim.note_live_event();

        // First check sees growth from 0 to 1 and is on curve.
        assert!(sim.poll(input(10, 720, &ledger, &roster)).is_empty());
        // No growth since the last check.
        let batches = sim.poll(input(20, 720, &ledger, &roster));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].kind, BatchKind::CatchUp);
        assert_eq!(batches[0].count, 1);

        let fired = sim.fire_due(Duration::from_secs(20) + config().catch_up_window);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].member.as_str(), "m1");
    }

    #[test]
    fn test_behind_curve_closes_gap() {
        let mut ledger = AckLedger::new(10, t0());
        let roster = roster(10);
        let mut sim = FallbackSimulator::new(config(), 1);
        sim.note_live_event();
        // Ledger grows each check but stays far behind.
        ledger.record(MemberKey::new("m0"), t0(), Origin::Live);
        let batches = sim.poll(input(50, 100, &ledger, &roster));
        // expected 0.5, ratio 0.1 → schedule ceil(5) - 1 = 4
        assert_eq!(batches[0].count, 4);
        assert_eq!(sim.pending(), 4);
    }

    #[test]
    fn test_poll_interval_respected() {
        let ledger = AckLedger::new(10, t0());
        let roster = roster(10);
        let mut sim = FallbackSimulator::new(config(), 1);
        sim.note_live_event();
        assert_eq!(sim.poll(input(10, 100, &ledger, &roster)).len(), 1);
        assert!(sim.poll(input(15, 100, &ledger, &roster)).is_empty());
    }

    #[test]
    fn test_catch_up_delays_within_window() {
        let ledger = AckLedger::new(50, t0());
        let roster = roster(50);
        let mut sim = FallbackSimulator::new(config(), 7);
        sim.note_live_event();
        sim.poll(input(80, 100, &ledger, &roster));
        let window = config().catch_up_window;
        let fired = sim.fire_due(Duration::MAX);
        assert!(!fired.is_empty());
        assert!(fired.iter().all(|a| a.due <= Duration::from_secs(80) + window));
    }

    #[test]
    fn test_disabled_simulator_never_schedules() {
        let ledger = AckLedger::new(5, t0());
        let roster = roster(5);
        let mut sim = FallbackSimulator::new(
            SimulatorConfig {
                enabled: false,
                ..config()
            },
            1,
        );
        assert!(sim.poll(input(500, 60, &ledger, &roster)).is_empty());
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let ledger = AckLedger::new(12, t0());
        let roster = roster(12);
        let mut a = FallbackSimulator::new(config(), 42);
        let mut b = FallbackSimulator::new(config(), 42);
        a.poll(input(8, 90, &ledger, &roster));
        b.poll(input(8, 90, &ledger, &roster));
        assert_eq!(a.fire_due(Duration::MAX), b.fire_due(Duration::MAX));
    }
}

//! Virtual clock
//!
//! Drives a [`Coordinator`] through elapsed samples without sleeping. Used
//! by `livecoord simulate` and by tests that check timing properties over
//! a full target window.

use std::time::Duration;

use crate::engine::phase::Phase;
use crate::engine::run::{Coordinator, TickReport};

/// Fixed-step sequence of elapsed samples starting at zero.
#[derive(Debug, Clone, Copy)]
pub struct VirtualClock {
    step: Duration,
    now: Duration,
    started: bool,
}

impl VirtualClock {
    /// Creates a clock that advances by `step`. A zero step is bumped to one
    /// millisecond so iteration always makes progress.
    #[must_use]
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.max(Duration::from_millis(1)),
            now: Duration::ZERO,
            started: false,
        }
    }

    /// Current elapsed sample.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }
}

impl Iterator for VirtualClock {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.started {
            self.now = self.now.checked_add(self.step)?;
        } else {
            self.started = true;
        }
        Some(self.now)
    }
}

/// Outcome of a virtual-time run.
#[derive(Debug, Clone)]
pub struct VirtualRun {
    /// Every tick report, in order
    pub reports: Vec<TickReport>,
    /// Elapsed time at which the run completed, if it did
    pub completed_at: Option<Duration>,
}

/// Ticks `coordinator` on `clock` until the run completes or `horizon`
/// passes. `on_tick` sees each report before the next tick.
pub fn drive<F>(
    coordinator: &mut Coordinator,
    clock: VirtualClock,
    horizon: Duration,
    mut on_tick: F,
) -> VirtualRun
where
    F: FnMut(&Coordinator, &TickReport),
{
    let mut reports = Vec::new();
    let mut completed_at = None;

    for sample in clock.take_while(|t| *t <= horizon) {
        let report = coordinator.tick(sample);
        on_tick(coordinator, &report);
        let done = report.phase.is_none_or(Phase::is_terminal);
        if report.completed() {
            completed_at = Some(report.elapsed);
        }
        reports.push(report);
        if done {
            break;
        }
    }

    VirtualRun {
        reports,
        completed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        let samples: Vec<Duration> = VirtualClock::new(Duration::from_millis(250)).take(3).collect();
        assert_eq!(
            samples,
            vec![
                Duration::ZERO,
                Duration::from_millis(250),
                Duration::from_millis(500)
            ]
        );
    }

    #[test]
    fn test_zero_step_still_advances() {
        let mut clock = VirtualClock::new(Duration::ZERO);
        clock.next();
        assert_eq!(clock.next(), Some(Duration::from_millis(1)));
    }
}

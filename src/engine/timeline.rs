//! Scenario task timeline
//!
//! A task is executed once elapsed time reaches its offset. Execution is
//! a pure function of elapsed time; the set only grows within a run.

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::ScenarioTask;

/// Returns whether `task` is due at `elapsed`. Tasks without a usable
/// offset never execute.
#[must_use]
pub fn is_due(task: &ScenarioTask, elapsed: Duration) -> bool {
    task.offset_seconds
        .is_some_and(|offset| elapsed >= Duration::from_secs(offset))
}

/// Tracks which scenario tasks have executed.
#[derive(Debug, Clone)]
pub struct TaskTimeline {
    tasks: Arc<[ScenarioTask]>,
    executed: Vec<bool>,
}

impl TaskTimeline {
    #[must_use]
    pub fn new(tasks: &[ScenarioTask]) -> Self {
        Self {
            tasks: tasks.into(),
            executed: vec![false; tasks.len()],
        }
    }

    /// Marks every due task executed and returns the ids newly executed, in
    /// scenario order.
    pub fn evaluate(&mut self, elapsed: Duration) -> Vec<String> {
        let mut newly = Vec::new();
        for (task, done) in self.tasks.iter().zip(self.executed.iter_mut()) {
            if !*done && is_due(task, elapsed) {
                *done = true;
                newly.push(task.id.clone());
            }
        }
        newly
    }

    /// Ids of executed tasks, in scenario order.
    #[must_use]
    pub fn executed_ids(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, done)| *done)
            .map(|(task, _)| task.id.clone())
            .collect()
    }

    #[must_use]
    pub fn is_executed(&self, id: &str) -> bool {
        self.iter().any(|(task, done)| done && task.id == id)
    }

    /// Tasks paired with their execution flag.
    pub fn iter(&self) -> impl Iterator<Item = (&ScenarioTask, bool)> {
        self.tasks.iter().zip(self.executed.iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

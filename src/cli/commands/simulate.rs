//! `simulate` command: a whole run on a virtual clock.
//!
//! Drives the same coordinator as `run` but samples elapsed time from a
//! [`VirtualClock`], so a twelve-minute activation finishes instantly and a
//! fixed seed reproduces it exactly.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::activation::{ActivationBackend, ActivationRequest, LocalActivationBackend};
use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::cli::commands::{coordinator, load_scenario};
use crate::config::ScenarioConfig;
use crate::engine::{Coordinator, ScheduledBatch, Snapshot, VirtualClock, VirtualRun, drive};
use crate::error::LiveCoordError;
use crate::observability::{Event, EventEmitter};

const MIN_HORIZON: Duration = Duration::from_secs(60);

/// Outcome of a virtual run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub scenario: String,
    pub seed: u64,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_seconds: Option<f64>,
    pub target_completion_seconds: u64,
    pub acknowledged: usize,
    pub total_members: usize,
    pub live: usize,
    pub simulated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_response_seconds: Option<f64>,
    pub tasks_executed: Vec<String>,
    pub batches: Vec<ScheduledBatch>,
    pub ticks: usize,
}

impl SimulationSummary {
    fn new(coordinator: &Coordinator, run: &VirtualRun, snapshot: &Snapshot) -> Self {
        let (live, simulated) = snapshot.origin_counts();
        Self {
            scenario: snapshot.scenario.clone(),
            seed: coordinator.seed(),
            completed: run.completed_at.is_some(),
            completed_at_seconds: run.completed_at.map(|d| d.as_secs_f64()),
            target_completion_seconds: snapshot.target_completion_seconds,
            acknowledged: snapshot.acknowledged,
            total_members: snapshot.total_members,
            live,
            simulated,
            mean_response_seconds: snapshot.mean_response_seconds(),
            tasks_executed: snapshot.task_execution_set.clone(),
            batches: run
                .reports
                .iter()
                .flat_map(|r| r.scheduled.iter().copied())
                .collect(),
            ticks: run.reports.len(),
        }
    }

    /// Multi-line human-readable rendering.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Scenario   {} (seed {})", self.scenario, self.seed);
        match self.completed_at_seconds {
            Some(at) => {
                let _ = writeln!(
                    out,
                    "Completed  at {at:.2}s (target {}s)",
                    self.target_completion_seconds
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "Completed  no (target {}s)",
                    self.target_completion_seconds
                );
            }
        }
        let _ = write!(
            out,
            "Ledger     {}/{} ({} live, {} simulated)",
            self.acknowledged, self.total_members, self.live, self.simulated
        );
        if let Some(mean) = self.mean_response_seconds {
            let _ = write!(out, ", mean response {mean:.1}s");
        }
        out.push('\n');
        let _ = writeln!(out, "Tasks      {}", self.tasks_executed.join(", "));
        for batch in &self.batches {
            let _ = writeln!(
                out,
                "Batch      {} x{} at {:.2}s",
                batch.kind.as_str(),
                batch.count,
                batch.at.as_secs_f64()
            );
        }
        out
    }
}

/// Runs a scenario on a virtual clock and prints the summary.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or the events file
/// cannot be created.
pub async fn run(args: &SimulateArgs) -> Result<(), LiveCoordError> {
    let config = load_scenario(&args.scenario)?;
    let emitter = args
        .events_file
        .as_deref()
        .map(EventEmitter::from_file)
        .transpose()?;

    let summary = simulate(
        Arc::clone(&config),
        args.seed,
        args.step,
        args.horizon,
        emitter.as_ref(),
    )
    .await?;

    if !summary.completed {
        tracing::warn!(
            acknowledged = summary.acknowledged,
            total = summary.total_members,
            "run did not complete within the horizon"
        );
    }

    match args.format {
        OutputFormat::Human => print!("{}", summary.render()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Simulates one run of `config` without sleeping.
///
/// # Errors
///
/// Returns an activation error if the local backend fails.
pub async fn simulate(
    config: Arc<ScenarioConfig>,
    seed: Option<u64>,
    step: Option<Duration>,
    horizon: Option<Duration>,
    emitter: Option<&EventEmitter>,
) -> Result<SimulationSummary, LiveCoordError> {
    let step = step
        .unwrap_or(config.clock.tick_interval)
        .max(Duration::from_millis(1));
    let horizon =
        horizon.unwrap_or_else(|| (config.scenario.target_completion * 2).max(MIN_HORIZON));

    let backend = LocalActivationBackend;
    let activation = backend
        .start_activation(&ActivationRequest::from_scenario(&config))
        .await?;

    let mut coordinator = coordinator(Arc::clone(&config), seed);
    let state = coordinator.start(activation).clone();
    if let Some(emitter) = emitter {
        emitter.emit(Event::RunStarted {
            timestamp: chrono::Utc::now(),
            run_id: state.run_id.clone(),
            scenario: config.scenario.name.clone(),
            total_members: state.total_members,
            target_seconds: state.target_completion.as_secs(),
            backend: format!("{} (virtual clock)", backend.name()),
        });
    }

    let run = drive(&mut coordinator, VirtualClock::new(step), horizon, |_, report| {
        if let Some(emitter) = emitter {
            emitter.emit_tick(report);
        }
    });

    let snapshot = coordinator.snapshot();
    if let Some(emitter) = emitter
        && run.completed_at.is_some()
        && let Some(event) = Event::completed(&snapshot)
    {
        emitter.emit(event);
    }

    Ok(SimulationSummary::new(&coordinator, &run, &snapshot))
}

//! Structured event stream.
//!
//! Discrete, typed events emitted during a run, serialized as JSONL with a
//! monotonically increasing sequence number. `livecoord run` writes them to
//! stdout or a file so a presentation layer can follow along.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{BatchKind, Origin, Phase, RunId, Snapshot, TickReport, TransitionReason};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a coordination run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A run was activated and started.
    RunStarted {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        scenario: String,
        total_members: usize,
        target_seconds: u64,
        /// Backend that issued the run id
        backend: String,
    },

    /// A phase was entered.
    PhaseEntered {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        from: Phase,
        phase: Phase,
        reason: TransitionReason,
        elapsed_seconds: u64,
        ratio: f64,
    },

    /// An acknowledgment was accepted into the ledger.
    MemberAcknowledged {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        member_id: String,
        origin: Origin,
        response_time_seconds: u64,
    },

    /// A timeline task executed.
    TaskExecuted {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        task_id: String,
        elapsed_seconds: u64,
    },

    /// The fallback simulator scheduled a batch.
    SimulationScheduled {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        kind: BatchKind,
        count: usize,
        elapsed_seconds: u64,
    },

    /// The run reached `complete`.
    RunCompleted {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        elapsed_seconds: u64,
        acknowledged: usize,
        total_members: usize,
        live: usize,
        simulated: usize,
    },

    /// The run was discarded.
    RunReset {
        timestamp: DateTime<Utc>,
        run_id: RunId,
        cancelled_timers: usize,
    },
}

impl Event {
    /// Builds a [`Event::RunCompleted`] from the final snapshot.
    #[must_use]
    pub fn completed(snapshot: &Snapshot) -> Option<Self> {
        let run_id = snapshot.run_id.clone()?;
        let (live, simulated) = snapshot.origin_counts();
        Some(Self::RunCompleted {
            timestamp: Utc::now(),
            run_id,
            elapsed_seconds: snapshot.elapsed_seconds,
            acknowledged: snapshot.acknowledged,
            total_members: snapshot.total_members,
            live,
            simulated,
        })
    }
}

/// Expands a tick report into events, in the order the tick produced them:
/// acknowledgments, phase changes, tasks, then simulator batches.
#[must_use]
pub fn tick_events(report: &TickReport) -> Vec<Event> {
    let Some(run_id) = &report.run_id else {
        return Vec::new();
    };
    let now = Utc::now();
    let elapsed_seconds = report.elapsed.as_secs();

    let acks = report.acknowledged.iter().map(|r| Event::MemberAcknowledged {
        timestamp: now,
        run_id: run_id.clone(),
        member_id: r.member.to_string(),
        origin: r.origin,
        response_time_seconds: r.response_time_seconds,
    });
    let phases = report.transitions.iter().map(|t| Event::PhaseEntered {
        timestamp: now,
        run_id: run_id.clone(),
        from: t.from,
        phase: t.to,
        reason: t.reason,
        elapsed_seconds,
        ratio: report.ratio,
    });
    let tasks = report.executed_tasks.iter().map(|id| Event::TaskExecuted {
        timestamp: now,
        run_id: run_id.clone(),
        task_id: id.clone(),
        elapsed_seconds,
    });
    let batches = report.scheduled.iter().map(|b| Event::SimulationScheduled {
        timestamp: now,
        run_id: run_id.clone(),
        kind: b.kind,
        count: b.count,
        elapsed_seconds,
    });

    acks.chain(phases).chain(tasks).chain(batches).collect()
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped: the event stream must never
/// stop a run.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Emits every event of a tick report.
    pub fn emit_tick(&self, report: &TickReport) {
        for event in tick_events(report) {
            self.emit(event);
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

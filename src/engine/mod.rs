//! Coordination engine
//!
//! Deterministic core of a run: the acknowledgment ledger, the phase
//! machine, the task timeline and the fallback simulator, composed by the
//! [`Coordinator`]. Nothing in here sleeps or spawns; time arrives as
//! elapsed samples from a driver.

pub mod clock;
pub mod ledger;
pub mod phase;
pub mod run;
pub mod simulator;
pub mod snapshot;
pub mod timeline;

pub use clock::{VirtualClock, VirtualRun, drive};
pub use ledger::{AckLedger, AcknowledgmentRecord, MemberKey, Origin};
pub use phase::{Phase, PhaseMachine, PhaseTransition, TransitionReason};
pub use run::{
    Activation, Coordinator, LiveOutcome, ResetReport, RunId, RunState, TickReport,
};
pub use simulator::{BatchKind, FallbackSimulator, PendingAck, ScheduledBatch, TimerArena};
pub use snapshot::{LedgerEntry, Snapshot, TaskView};
pub use timeline::TaskTimeline;

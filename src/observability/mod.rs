//! Observability
//!
//! Logging, metrics and the JSONL event stream for coordination runs.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, tick_events};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;

//! Metrics collection.
//!
//! Prometheus-compatible metrics recorded through the `metrics` facade.
//! Without an installed recorder every function is a no-op, so the engine
//! calls them unconditionally.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::engine::Origin;
use crate::error::LiveCoordError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `LiveCoordError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), LiveCoordError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| LiveCoordError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "livecoord_runs_started_total",
        "Total number of coordination runs started"
    );
    describe_counter!(
        "livecoord_runs_reset_total",
        "Total number of runs discarded by reset"
    );
    describe_counter!(
        "livecoord_acknowledgments_total",
        "Acknowledgments accepted into the ledger by origin"
    );
    describe_counter!(
        "livecoord_duplicates_total",
        "Acknowledgments rejected as duplicates by origin"
    );
    describe_counter!(
        "livecoord_unknown_members_total",
        "Live acknowledgments that matched no roster member"
    );
    describe_counter!(
        "livecoord_phase_transitions_total",
        "Total number of phase transitions"
    );
    describe_counter!(
        "livecoord_simulated_batches_total",
        "Simulator batches scheduled by trigger"
    );
    describe_counter!(
        "livecoord_simulated_scheduled_total",
        "Simulated acknowledgments scheduled by trigger"
    );
    describe_gauge!("livecoord_ack_ratio", "Acknowledged fraction of the roster");
    describe_histogram!(
        "livecoord_response_time_seconds",
        "Seconds from run start to acknowledgment"
    );
    describe_counter!(
        "livecoord_transport_errors_total",
        "Live transport errors by transport type"
    );
}

/// Records a run start.
pub fn record_run_started() {
    counter!("livecoord_runs_started_total").increment(1);
}

/// Records a reset.
pub fn record_run_reset() {
    counter!("livecoord_runs_reset_total").increment(1);
}

/// Records an accepted acknowledgment.
#[allow(clippy::cast_precision_loss)]
pub fn record_acknowledgment(origin: Origin, response_time_seconds: u64) {
    counter!("livecoord_acknowledgments_total", "origin" => origin.as_str()).increment(1);
    histogram!("livecoord_response_time_seconds", "origin" => origin.as_str())
        .record(response_time_seconds as f64);
}

/// Records a rejected duplicate.
pub fn record_duplicate(origin: Origin) {
    counter!("livecoord_duplicates_total", "origin" => origin.as_str()).increment(1);
}

/// Records a live acknowledgment that matched nobody.
pub fn record_unknown_member() {
    counter!("livecoord_unknown_members_total").increment(1);
}

/// Records a phase transition. Phase names are a closed set.
pub fn record_phase_transition(from: &'static str, to: &'static str) {
    counter!("livecoord_phase_transitions_total", "from" => from, "to" => to).increment(1);
}

/// Records a simulator batch.
pub fn record_simulated_batch(kind: &'static str, count: usize) {
    counter!("livecoord_simulated_batches_total", "kind" => kind).increment(1);
    counter!("livecoord_simulated_scheduled_total", "kind" => kind)
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Sets the acknowledged fraction gauge.
pub fn set_ack_ratio(ratio: f64) {
    gauge!("livecoord_ack_ratio").set(ratio);
}

/// Records a live transport error.
pub fn record_transport_error(transport: &'static str) {
    counter!("livecoord_transport_errors_total", "transport" => transport).increment(1);
}

//! `run` command: one real-time coordination.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::cli::commands::{activation_backend, coordinator, load_scenario, start_metrics};
use crate::error::LiveCoordError;
use crate::observability::EventEmitter;
use crate::session::CoordinationSession;
use crate::transport::{ChannelHub, HttpEventTransport, LiveTransport};

/// Activates a run, drives it until it completes or the process is
/// interrupted, and streams JSONL events along the way.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded, the events file
/// cannot be created, or activation fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), LiveCoordError> {
    start_metrics(&args.session)?;

    let config = load_scenario(&args.session.scenario)?;
    let backend = activation_backend(args.session.backend_url.as_deref())?;

    let transport: Arc<dyn LiveTransport> = match args
        .events_url
        .as_deref()
        .or(args.session.backend_url.as_deref())
    {
        Some(url) => Arc::new(HttpEventTransport::new(url)?),
        // Nothing publishes into a private hub: the run is fully simulated.
        None => Arc::new(ChannelHub::default()),
    };

    let emitter = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stdout(),
    };

    let session = CoordinationSession::new(
        coordinator(config, args.session.seed),
        backend,
        transport,
        Arc::new(emitter),
    );

    let state = session.start().await?;
    tracing::info!(
        run_id = %state.run_id,
        members = state.total_members,
        target_secs = state.target_completion.as_secs(),
        "coordinating"
    );

    tokio::select! {
        completed = session.wait_for_completion() => {
            let snapshot = session.snapshot();
            if completed.is_some() {
                let (live, simulated) = snapshot.origin_counts();
                tracing::info!(
                    elapsed_secs = snapshot.elapsed_seconds,
                    live,
                    simulated,
                    "coordination finished"
                );
            }
        }
        () = cancel.cancelled() => {
            tracing::info!("interrupted; resetting run");
            session.reset().await;
        }
    }

    Ok(())
}

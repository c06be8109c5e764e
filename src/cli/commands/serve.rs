//! `serve` command: the HTTP control API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::api::{self, ApiState};
use crate::cli::args::ServeArgs;
use crate::cli::commands::{activation_backend, coordinator, load_scenario, start_metrics};
use crate::error::{LiveCoordError, TransportError};
use crate::observability::EventEmitter;
use crate::session::CoordinationSession;
use crate::transport::ChannelHub;

/// Serves the API until interrupted. Any active run is reset on shutdown.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or the address cannot
/// be bound.
pub async fn run(args: &ServeArgs, cancel: CancellationToken) -> Result<(), LiveCoordError> {
    start_metrics(&args.session)?;

    let config = load_scenario(&args.session.scenario)?;
    let backend = activation_backend(args.session.backend_url.as_deref())?;
    let emitter = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let hub = ChannelHub::default();
    let session = Arc::new(CoordinationSession::new(
        coordinator(config, args.session.seed),
        backend,
        Arc::new(hub.clone()),
        Arc::new(emitter),
    ));

    let addr = parse_bind_addr(&args.bind)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("bind failed: {e}")))?;

    let state = Arc::new(ApiState::new(Arc::clone(&session), hub));
    api::serve(listener, state, cancel).await?;

    if let Some(report) = session.reset().await {
        tracing::info!(run_id = %report.run_id, "active run discarded on shutdown");
    }
    Ok(())
}

/// Parses a bind address string into a socket address.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`TransportError::ConnectionFailed`] if the result cannot be
/// parsed as a valid socket address.
pub fn parse_bind_addr(input: &str) -> Result<SocketAddr, TransportError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>().map_err(|e| {
        TransportError::ConnectionFailed(format!("invalid bind address \"{input}\": {e}"))
    })
}

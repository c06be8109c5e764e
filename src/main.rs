//! `livecoord` - Live coordination engine for crisis-playbook demonstrations

use clap::Parser;
use tokio_util::sync::CancellationToken;

use livecoord::cli::args::Cli;
use livecoord::cli::commands;
use livecoord::error::ExitCode;
use livecoord::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format.into(), cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();

    // First signal requests a graceful shutdown, the second forces exit.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            eprintln!("warning: failed to register SIGTERM handler");
            return;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }

        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        signal_cancel.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
        }
    });

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler, plus the
//! scenario and session wiring shared by `run` and `serve`.

pub mod completions;
pub mod run;
pub mod scenarios;
pub mod serve;
pub mod simulate;
pub mod version;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::activation::{ActivationBackend, HttpActivationBackend, LocalActivationBackend};
use crate::cli::args::{Cli, Commands, ScenariosSubcommand, SessionArgs};
use crate::config::{ConfigLoader, ScenarioConfig};
use crate::engine::Coordinator;
use crate::error::LiveCoordError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), LiveCoordError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Simulate(args) => simulate::run(&args).await,
        Commands::Serve(args) => serve::run(&args, cancel).await,
        Commands::Scenarios(cmd) => match cmd.subcommand {
            ScenariosSubcommand::List(args) => scenarios::list(&args),
            ScenariosSubcommand::Show(args) => scenarios::show(&args),
            ScenariosSubcommand::Validate(args) => scenarios::validate(&args),
        },
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Resolves `--scenario` and logs loader warnings.
///
/// # Errors
///
/// Returns a config error if the scenario is unknown or invalid.
pub fn load_scenario(name_or_path: &str) -> Result<Arc<ScenarioConfig>, LiveCoordError> {
    let loader = ConfigLoader::with_defaults();
    let result = crate::scenarios::resolve(name_or_path, &loader)?;
    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    tracing::info!(
        scenario = %result.config.scenario.name,
        members = result.config.total_members(),
        tasks = result.config.tasks.len(),
        "scenario loaded"
    );
    Ok(result.config)
}

/// Builds a coordinator, honoring a `--seed` override.
#[must_use]
pub fn coordinator(config: Arc<ScenarioConfig>, seed: Option<u64>) -> Coordinator {
    match seed {
        Some(seed) => Coordinator::with_seed(config, seed),
        None => Coordinator::new(config),
    }
}

/// Picks the activation backend for `--backend-url`.
///
/// # Errors
///
/// Returns an activation error if the HTTP client cannot be built.
pub fn activation_backend(
    backend_url: Option<&str>,
) -> Result<Arc<dyn ActivationBackend>, LiveCoordError> {
    Ok(match backend_url {
        Some(url) => {
            tracing::info!(url, "using remote activation backend");
            Arc::new(HttpActivationBackend::new(url)?)
        }
        None => Arc::new(LocalActivationBackend),
    })
}

/// Starts the Prometheus exporter when `--metrics-port` is set.
///
/// # Errors
///
/// Returns an I/O error if the exporter cannot bind.
pub fn start_metrics(args: &SessionArgs) -> Result<(), LiveCoordError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_builtin_scenario() {
        let config = load_scenario("one-click").unwrap();
        assert_eq!(config.total_members(), 8);
    }

    #[test]
    fn load_unknown_scenario_suggests() {
        let err = load_scenario("one-clik").unwrap_err();
        assert!(err.to_string().contains("did you mean 'one-click'"));
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn seed_override() {
        let config = load_scenario("one-click").unwrap();
        assert_eq!(coordinator(config, Some(99)).seed(), 99);
    }

    #[test]
    fn backend_selection() {
        assert_eq!(activation_backend(None).unwrap().name(), "local");
        assert_eq!(
            activation_backend(Some("http://localhost:4000")).unwrap().name(),
            "http"
        );
    }
}

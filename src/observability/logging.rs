//! Logging setup for the `livecoord` binary.
//!
//! `-v` flags raise the level of this crate's own targets only. HTTP
//! dependencies (hyper, reqwest, axum) stay at `warn` unless
//! `LIVECOORD_LOG_LEVEL` asks for them explicitly, since at `debug` they
//! drown out the run's phase and acknowledgment lines.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the `-v` derived filter. Accepts any
/// `EnvFilter` directive string, e.g. `livecoord::session=trace,hyper=info`.
pub const LOG_LEVEL_ENV: &str = "LIVECOORD_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line, for log shippers
    Json,
}

/// Level for this crate's targets at a given `-v` count.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Picks the filter directive: a parseable override wins, otherwise the
/// verbosity level scoped to this crate.
///
/// An override that `EnvFilter` rejects is ignored rather than silencing
/// all output.
#[must_use]
pub fn filter_directive(verbosity: u8, env_override: Option<&str>) -> String {
    if let Some(raw) = env_override.map(str::trim).filter(|s| !s.is_empty())
        && EnvFilter::try_new(raw).is_ok()
    {
        return raw.to_string();
    }
    format!(
        "warn,{}={}",
        env!("CARGO_CRATE_NAME"),
        verbosity_to_directive(verbosity)
    )
}

fn use_ansi(color: ColorChoice, stderr_is_terminal: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => stderr_is_terminal && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global subscriber on stderr. Later calls are no-ops.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let env_override = std::env::var(LOG_LEVEL_ENV).ok();
    let directive = filter_directive(verbosity, env_override.as_deref());
    let filter = EnvFilter::new(&directive);
    let show_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let ansi = use_ansi(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

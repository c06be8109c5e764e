//! CLI argument definitions
//!
//! All Clap derive structs for `livecoord` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

/// Scenario used when `--scenario` is omitted.
pub const DEFAULT_SCENARIO: &str = "one-click";

// ============================================================================
// Root CLI
// ============================================================================

/// Live coordination engine for crisis-playbook activation demonstrations.
#[derive(Parser, Debug)]
#[command(name = "livecoord", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "LIVECOORD_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, default_value = "human", global = true, env = "LIVECOORD_LOG_FORMAT")]
    pub log_format: LogFormatChoice,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one coordination in real time, streaming JSONL events.
    Run(RunArgs),

    /// Run a scenario on a virtual clock and print a summary.
    Simulate(SimulateArgs),

    /// Serve the HTTP control API.
    Serve(ServeArgs),

    /// Inspect built-in scenarios and validate scenario files.
    Scenarios(ScenariosCommand),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Scenario and backend selection shared by `run` and `serve`.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Built-in scenario name or path to a scenario YAML file.
    #[arg(short, long, default_value = DEFAULT_SCENARIO, env = "LIVECOORD_SCENARIO")]
    pub scenario: String,

    /// Override the scenario's jitter seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Activation backend base URL. Runs are activated locally when absent.
    #[arg(long, env = "LIVECOORD_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "LIVECOORD_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Run / Simulate / Serve
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Live event stream base URL (`{url}/activations/{id}/events`). Falls back to
    /// `--backend-url`; without either, the run relies on simulation.
    #[arg(long, env = "LIVECOORD_EVENTS_URL")]
    pub events_url: Option<String>,

    /// Write JSONL events to this file instead of stdout.
    #[arg(long, env = "LIVECOORD_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Built-in scenario name or path to a scenario YAML file.
    #[arg(short, long, default_value = DEFAULT_SCENARIO)]
    pub scenario: String,

    /// Override the scenario's jitter seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Virtual clock step (e.g. "250ms"). Defaults to the scenario tick.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub step: Option<Duration>,

    /// Stop after this much virtual time. Defaults to twice the target.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub horizon: Option<Duration>,

    /// Also write every event as JSONL to this file.
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Bind address, `[host:]port`.
    #[arg(long, default_value = "127.0.0.1:8080", env = "LIVECOORD_BIND")]
    pub bind: String,

    /// Write JSONL events to this file. Events are discarded when absent.
    #[arg(long, env = "LIVECOORD_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

// ============================================================================
// Scenarios Command
// ============================================================================

/// Scenario inspection commands.
#[derive(Args, Debug)]
pub struct ScenariosCommand {
    /// Scenarios subcommand.
    #[command(subcommand)]
    pub subcommand: ScenariosSubcommand,
}

/// Scenarios subcommands.
#[derive(Subcommand, Debug)]
pub enum ScenariosSubcommand {
    /// List built-in scenarios.
    List(ScenariosListArgs),

    /// Print a built-in scenario's YAML.
    Show(ScenariosShowArgs),

    /// Validate scenario files without running them.
    Validate(ScenariosValidateArgs),
}

/// Arguments for `scenarios list`.
#[derive(Args, Debug)]
pub struct ScenariosListArgs {
    /// Filter by tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `scenarios show`.
#[derive(Args, Debug)]
pub struct ScenariosShowArgs {
    /// Scenario name.
    pub name: String,
}

/// Arguments for `scenarios validate`.
#[derive(Args, Debug)]
pub struct ScenariosValidateArgs {
    /// Scenario files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Log format choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatChoice {
    /// Human-readable lines.
    #[default]
    Human,
    /// Newline-delimited JSON.
    Json,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Human => Self::Human,
            LogFormatChoice::Json => Self::Json,
        }
    }
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================

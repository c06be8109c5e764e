//! Shared helpers for integration tests: scenario loading, run activation
//! and spawning the `livecoord` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;

use chrono::Utc;
use livecoord::config::{ConfigLoader, ScenarioConfig};
use livecoord::engine::{Activation, Coordinator, RunId};
use livecoord::scenarios;

/// Loads a built-in scenario.
#[allow(clippy::missing_panics_doc)]
pub fn builtin(name: &str) -> Arc<ScenarioConfig> {
    scenarios::resolve(name, &ConfigLoader::with_defaults())
        .expect("built-in scenario should load")
        .config
}

/// Coordinator over a built-in scenario with a fixed seed.
pub fn coordinator(name: &str, seed: u64) -> Coordinator {
    Coordinator::with_seed(builtin(name), seed)
}

/// Activation as the local backend would issue it.
pub fn activation(run_id: &str) -> Activation {
    Activation {
        execution_id: RunId::new(run_id),
        start_time: Utc::now(),
    }
}

/// Path to a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the binary to completion with `--quiet`.
#[allow(clippy::missing_panics_doc)]
pub fn livecoord(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_livecoord"))
        .args(args)
        .arg("--quiet")
        .output()
        .expect("failed to spawn livecoord")
}

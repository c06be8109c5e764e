//! Scenarios command handlers
//!
//! Implements `scenarios list`, `scenarios show` and `scenarios validate`.

use std::fmt::Write as _;

use crate::cli::args::{OutputFormat, ScenariosListArgs, ScenariosShowArgs, ScenariosValidateArgs};
use crate::config::{ConfigLoader, LoadResult};
use crate::error::{ConfigError, LiveCoordError, Severity, ValidationIssue};
use crate::scenarios;

/// List available built-in scenarios.
///
/// # Errors
///
/// Returns a JSON error if output serialization fails.
pub fn list(args: &ScenariosListArgs) -> Result<(), LiveCoordError> {
    let results = scenarios::list_scenarios(args.tag.as_deref());
    let loader = ConfigLoader::with_defaults();

    match args.format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = results
                .iter()
                .map(|s| {
                    let config = loader.load_str(s.name, s.yaml).ok().map(|r| r.config);
                    serde_json::json!({
                        "name": s.name,
                        "description": s.description,
                        "tags": s.tags,
                        "members": config.as_ref().map(|c| c.total_members()),
                        "targetSeconds": config.as_ref().map(|c| c.scenario.target_completion.as_secs()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Human => {
            if results.is_empty() {
                println!("No scenarios match the given filters.");
                return Ok(());
            }

            println!("Built-in Scenarios ({} available)\n", results.len());
            for s in &results {
                let tags = format!("[{}]", s.tags.join(", "));
                println!("  {:<18}{:<68}{tags}", s.name, s.description);
            }
            println!();
            println!("Simulate a scenario: livecoord simulate --scenario <name>");
            println!("View YAML:           livecoord scenarios show <name>");
        }
    }

    Ok(())
}

/// Display the YAML of a built-in scenario.
///
/// # Errors
///
/// Returns a usage error if the scenario name is not found.
pub fn show(args: &ScenariosShowArgs) -> Result<(), LiveCoordError> {
    let scenario = scenarios::find_scenario(&args.name).ok_or_else(|| {
        let mut message = format!("Unknown scenario '{}'", args.name);

        if let Some(suggestion) = scenarios::suggest_scenario(&args.name) {
            let _ = write!(message, "\n\nDid you mean '{suggestion}'?");
        }

        message.push_str("\n\nAvailable scenarios:");
        for name in scenarios::list_scenario_names() {
            if let Some(s) = scenarios::find_scenario(name) {
                let _ = write!(message, "\n  {:<18}{}", s.name, s.description);
            }
        }
        LiveCoordError::Usage(message)
    })?;

    print!("{}", scenario.yaml);
    Ok(())
}

/// Validate scenario files without running them.
///
/// Every file is checked before reporting; the first failure is returned.
///
/// # Errors
///
/// Returns the first config error, or a validation error per file whose
/// warnings fail `--strict`.
pub fn validate(args: &ScenariosValidateArgs) -> Result<(), LiveCoordError> {
    let loader = ConfigLoader::with_defaults();
    let mut report = Vec::new();
    let mut first_error = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating scenario");
        let outcome = loader
            .load(path)
            .and_then(|result| strict_check(&path.display().to_string(), result, args.strict));

        match outcome {
            Ok(result) => {
                for warning in &result.warnings {
                    tracing::warn!(
                        file = %path.display(),
                        location = warning.location.as_deref().unwrap_or("<unknown>"),
                        "{}",
                        warning.message
                    );
                }
                report.push(serde_json::json!({
                    "file": path.display().to_string(),
                    "valid": true,
                    "scenario": result.config.scenario.name,
                    "warnings": result.warnings.iter().map(|w| w.message.as_str()).collect::<Vec<_>>(),
                }));
                if args.format == OutputFormat::Human {
                    println!("ok      {} ({})", path.display(), result.config.scenario.name);
                }
            }
            Err(e) => {
                report.push(serde_json::json!({
                    "file": path.display().to_string(),
                    "valid": false,
                    "error": e.to_string(),
                }));
                if args.format == OutputFormat::Human {
                    println!("FAILED  {}: {e}", path.display());
                }
                first_error.get_or_insert(e);
            }
        }
    }

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

fn strict_check(path: &str, result: LoadResult, strict: bool) -> Result<LoadResult, ConfigError> {
    if !strict || result.warnings.is_empty() {
        return Ok(result);
    }
    Err(ConfigError::ValidationError {
        path: path.to_string(),
        errors: result
            .warnings
            .iter()
            .map(|w| ValidationIssue {
                path: w.location.clone().unwrap_or_else(|| "<unknown>".to_string()),
                message: w.message.clone(),
                severity: Severity::Error,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_yaml(dir: &tempfile::TempDir, name: &str, yaml: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(yaml.as_bytes())
            .unwrap();
        path
    }

    fn validate_args(files: Vec<PathBuf>, strict: bool) -> ScenariosValidateArgs {
        ScenariosValidateArgs {
            files,
            format: OutputFormat::Json,
            strict,
        }
    }

    #[test]
    fn show_unknown_suggests() {
        let err = show(&ScenariosShowArgs {
            name: "investr".to_string(),
        })
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Did you mean 'investor'?"));
        assert!(message.contains("live-activation"));
        assert_eq!(err.exit_code(), crate::error::ExitCode::USAGE_ERROR);
    }

    #[test]
    fn validate_builtin_copy_passes_strict() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = scenarios::find_scenario("one-click").unwrap().yaml;
        let path = write_yaml(&dir, "one-click.yaml", yaml);
        validate(&validate_args(vec![path], true)).unwrap();
    }

    #[test]
    fn validate_reports_missing_file() {
        let err = validate(&validate_args(vec![PathBuf::from("/nonexistent/x.yaml")], false))
            .unwrap_err();
        assert!(matches!(
            err,
            LiveCoordError::Config(ConfigError::MissingFile { .. })
        ));
    }

    #[test]
    fn strict_turns_warnings_into_errors() {
        let result = ConfigLoader::with_defaults()
            .load_str(
                "inline",
                "scenario:\n  name: thin\n  target_completion: 30s\nroster: []\n",
            )
            .unwrap();
        assert!(!result.warnings.is_empty());
        let err = strict_check("inline", result, true).unwrap_err();
        assert!(err.to_string().starts_with("validation failed for inline"));
    }
}

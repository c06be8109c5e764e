//! Error types for `livecoord`
//!
//! A single hierarchy covers scenario loading, live transport, activation
//! and engine failures, each mapped to a process exit code.
//!
//! Most of what goes wrong during a run is deliberately *not* an error here:
//! a silent transport or a duplicate acknowledgment is absorbed by the
//! engine. Only start failures and bad configuration reach the caller.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `livecoord` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Live transport error (subscription or stream failure)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Activation could not be started
    pub const ACTIVATION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `livecoord` operations.
#[derive(Debug, Error)]
pub enum LiveCoordError {
    /// Scenario loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Live transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Activation start failure
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// Coordination engine misuse
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LiveCoordError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Activation(_) => ExitCode::ACTIVATION_ERROR,
            Self::Engine(_) => ExitCode::ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Scenario loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the scenario file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Scenario validation failed
    #[error("validation failed for {path}: {}", summarize(.errors))]
    ValidationError {
        /// Path (or built-in name) of the scenario
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced scenario file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Built-in scenario name is unknown
    #[error("unknown scenario '{name}'{}", did_you_mean(.suggestion.as_deref()))]
    UnknownScenario {
        /// Name that was requested
        name: String,
        /// Closest known name, if any is similar enough
        suggestion: Option<String>,
    },

    /// Scenario exceeds a configured size limit
    #[error("limit exceeded for {what}: {actual} (limit: {limit})")]
    LimitExceeded {
        /// Which limit was exceeded
        what: String,
        /// Observed value
        actual: usize,
        /// Configured limit
        limit: usize,
    },
}

fn did_you_mean(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"))
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during scenario validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "policy.completing_ratio")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the scenario from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Live transport errors.
///
/// The coordinator never fails a run because of these; they are logged and
/// the fallback simulator carries the run.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error while reading the event stream
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event payload could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Subscription could not be established
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed event framing
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ============================================================================
// Activation Errors
// ============================================================================

/// Errors starting an activation against the backend.
///
/// Start failures are terminal for that attempt. Nothing retries
/// automatically; the caller must invoke `start()` again.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// Backend answered with a non-success status
    #[error("failed to start activation: backend returned {status}: {message}")]
    StartFailed {
        /// HTTP status code returned
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Backend could not be reached
    #[error("failed to start activation: {0}")]
    Unreachable(String),

    /// Backend response could not be decoded
    #[error("failed to start activation: malformed response: {0}")]
    MalformedResponse(String),
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Coordination engine misuse errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An operation needed an active run but none exists
    #[error("no active run")]
    NoActiveRun,

    /// A live event arrived for a run that is not the active one
    #[error("event for run '{got}' does not match active run '{active}'")]
    RunMismatch {
        /// Run id carried by the event
        got: String,
        /// Currently active run id
        active: String,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `livecoord` operations.
pub type Result<T> = std::result::Result<T, LiveCoordError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::TRANSPORT_ERROR, 4);
        assert_eq!(ExitCode::ACTIVATION_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_activation_error_exit_code() {
        let err: LiveCoordError = ActivationError::StartFailed {
            status: 503,
            message: "unavailable".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::ACTIVATION_ERROR);
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: LiveCoordError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_transport_error_exit_code() {
        let err: LiveCoordError = TransportError::ConnectionFailed("test".to_string()).into();
        assert_eq!(err.exit_code(), ExitCode::TRANSPORT_ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: LiveCoordError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = LiveCoordError::Usage("missing --scenario".to_string());
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "policy.threshold_ratio".to_string(),
            message: "ratio must be in (0, 1]".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: ratio must be in (0, 1] at policy.threshold_ratio"
        );
    }

    #[test]
    fn test_validation_error_lists_issues() {
        let err = ConfigError::ValidationError {
            path: "demo.yaml".to_string(),
            errors: vec![ValidationIssue {
                path: "scenario.target_completion".to_string(),
                message: "must be positive".to_string(),
                severity: Severity::Error,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("demo.yaml"));
        assert!(text.contains("must be positive"));
    }

    #[test]
    fn test_unknown_scenario_suggestion() {
        let err = ConfigError::UnknownScenario {
            name: "one-clik".to_string(),
            suggestion: Some("one-click".to_string()),
        };
        assert!(err.to_string().contains("did you mean 'one-click'"));

        let err = ConfigError::UnknownScenario {
            name: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown scenario 'zzz'");
    }
}

//! Error types for `strongman`
//!
//! A single top-level error aggregates the per-domain errors and maps each
//! of them to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `strongman` CLI operations.
///
/// These codes follow Unix conventions.
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

    /// Sensor bus error (device could not be opened or written)
    pub const BUS_ERROR: i32 = 4;

    /// Overlay rendering error (image allocation, compositor failure)
    pub const RENDER_ERROR: i32 = 5;

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

/// Top-level error type for `strongman` operations.
#[derive(Debug, Error)]
pub enum StrongmanError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sensor bus error
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Overlay rendering error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A controller task panicked or was aborted
    #[error("controller task failed: {0}")]
    Task(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StrongmanError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Bus(_) => ExitCode::BUS_ERROR,
            Self::Render(_) => ExitCode::RENDER_ERROR,
            Self::Task(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for StrongmanError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", format_issues(.errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration file too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Actual file size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "calibration.player2.divisor")
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
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Bus Errors
// ============================================================================

/// Sensor bus errors.
///
/// Read errors never surface here: they are logged and the read is retried.
#[derive(Debug, Error)]
pub enum BusError {
    /// I/O error while opening or writing the bus
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bus device could not be opened
    #[error("cannot open bus device {path}: {source}")]
    Open {
        /// Device path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The outbound channel was closed before the message was written
    #[error("bus writer closed")]
    WriterClosed,
}

// ============================================================================
// Render Errors
// ============================================================================

/// Overlay rendering errors. All of them are fatal for the controller.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The off-screen image buffer could not be allocated
    #[error("failed to allocate {bytes} byte overlay image")]
    ImageAllocation {
        /// Requested buffer size in bytes
        bytes: usize,
    },

    /// The compositor rejected a request
    #[error("compositor error: {0}")]
    Compositor(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `strongman` operations.
pub type Result<T> = std::result::Result<T, StrongmanError>;

// ============================================================================
// Tests
// ============================================================================

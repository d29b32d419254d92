//! CLI argument definitions
//!
//! All Clap derive structs for `strongman` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Two-player strength game controller.
#[derive(Parser, Debug)]
#[command(name = "strongman", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace, -vvvv bus bytes too).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "STRONGMAN_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "STRONGMAN_COLOR")]
    pub color: ColorChoice,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the game controller.
    Run(RunArgs),

    /// Validate configuration files without starting the controller.
    Validate(ValidateArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "STRONGMAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sensor bus device; overrides `bus.device` from the configuration.
    #[arg(short, long, env = "STRONGMAN_BUS")]
    pub bus: Option<PathBuf>,

    /// Length of one media loop driven by the built-in loop clock.
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub loop_period: Duration,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "STRONGMAN_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Write JSONL match events to this file.
    #[arg(long, env = "STRONGMAN_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
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

/// Log format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines.
    #[default]
    Human,
    /// Newline-delimited JSON.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Human => Self::Human,
            LogFormatArg::Json => Self::Json,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Logging initialization for `strongman`.
//!
//! Verbosity only raises this crate's own modules; dependencies stay at
//! `warn`. Phase transitions from `strongman::game` are logged even at the
//! default verbosity, since they are the controller's heartbeat. The bus
//! framer and the overlay renderer trace per byte and per frame, so they
//! are held at `debug` until one step past `-vvv`. `STRONGMAN_LOG_LEVEL`
//! replaces all of this with an explicit filter.

use std::fmt::Write as _;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "STRONGMAN_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Modules that log per byte or per frame at `trace`.
const CHATTY_MODULES: [&str; 2] = ["strongman::bus", "strongman::overlay::renderer"];

/// Verbosity at which [`CHATTY_MODULES`] are released to `trace`.
const FULL_TRACE: u8 = 4;

/// Maps a verbosity level to the crate's tracing level.
///
/// - 0 → `"warn"`
/// - 1 → `"info"`
/// - 2 → `"debug"`
/// - 3+ → `"trace"` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Builds the default filter directives for `verbosity`.
#[must_use]
pub fn default_directives(verbosity: u8) -> String {
    let level = verbosity_to_directive(verbosity);
    let mut directives = format!("warn,strongman={level}");
    if verbosity == 0 {
        directives.push_str(",strongman::game=info");
    }
    if (3..FULL_TRACE).contains(&verbosity) {
        for module in CHATTY_MODULES {
            let _ = write!(directives, ",{module}=debug");
        }
    }
    directives
}

/// Initializes the global tracing subscriber.
///
/// If `STRONGMAN_LOG_LEVEL` is set it takes precedence over `verbosity`.
/// Uses `try_init()`, so calling this more than once is harmless.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

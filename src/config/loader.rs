//! Configuration loader.
//!
//! Pipeline: size check, read, `${VAR}` expansion on the raw text, YAML
//! parse, deserialize, validate, freeze behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use crate::config::schema::GameConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Default upper bound on configuration file size.
pub const DEFAULT_MAX_CONFIG_SIZE: usize = 256 * 1024;

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<GameConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Loads `GameConfig` files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    max_size: usize,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_CONFIG_SIZE,
        }
    }
}

impl ConfigLoader {
    /// Creates a loader with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the file size limit.
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Loads, validates, and freezes the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, an environment
    /// reference cannot be resolved, the YAML is malformed, or validation
    /// finds errors.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.max_size {
            return Err(ConfigError::TooLarge {
                size,
                limit: self.max_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let location = path.display().to_string();
        self.load_str(raw, &location).map_err(|e| match e {
            ConfigError::ParseError { line, message, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                line,
                message,
            },
            other => other,
        })
    }

    /// Loads a configuration from YAML text. `location` names the source in
    /// errors and warnings.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_str(&self, raw: &str, location: &str) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let expanded = expand_env(raw, location, &mut warnings)?;

        // An empty or comment-only document means "all defaults".
        let config: GameConfig = if expanded.trim().is_empty() || is_null_document(&expanded) {
            GameConfig::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: location.into(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: location.to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

fn is_null_document(text: &str) -> bool {
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(text),
        Ok(serde_yaml::Value::Null)
    )
}

/// Expands environment references in raw YAML text.
///
/// - `${VAR}` expands to the value, or to nothing with a warning if unset
/// - `${VAR:-default}` expands to `default` if unset
/// - `${VAR:?message}` fails if unset
/// - `$$` is a literal `$`
fn expand_env(
    raw: &str,
    location: &str,
    warnings: &mut Vec<LoadWarning>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
            continue;
        }
        let Some(body_start) = tail.strip_prefix('{') else {
            out.push('$');
            rest = tail;
            continue;
        };
        let close = body_start.find('}').ok_or_else(|| ConfigError::ParseError {
            path: location.into(),
            line: None,
            message: "unclosed environment variable reference".to_string(),
        })?;
        let reference = &body_start[..close];
        rest = &body_start[close + 1..];

        let (name, fallback) = match reference.split_once(":-") {
            Some((name, default)) => (name, Fallback::Default(default)),
            None => match reference.split_once(":?") {
                Some((name, message)) => (name, Fallback::Required(message)),
                None => (reference, Fallback::Warn),
            },
        };

        match (std::env::var(name), fallback) {
            (Ok(value), _) => out.push_str(&value),
            (Err(_), Fallback::Default(default)) => out.push_str(default),
            (Err(_), Fallback::Required(message)) => {
                return Err(ConfigError::EnvVarNotSet {
                    var: name.to_string(),
                    location: if message.is_empty() {
                        location.to_string()
                    } else {
                        format!("{location}: {message}")
                    },
                });
            }
            (Err(_), Fallback::Warn) => warnings.push(LoadWarning {
                message: format!("environment variable '{name}' is not set, using empty string"),
                location: Some(location.to_string()),
            }),
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
enum Fallback<'a> {
    Default(&'a str),
    Required(&'a str),
    Warn,
}

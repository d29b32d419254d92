//! `strongman validate`

use crate::cli::args::ValidateArgs;
use crate::config::loader::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, Severity, StrongmanError, ValidationIssue};

/// Validate configuration files without starting the controller.
///
/// Every file is checked; the first failure is returned after all of them
/// have been reported.
///
/// # Errors
///
/// Returns a configuration error if any file fails to load or validate, or
/// has warnings under `--strict`.
pub fn validate(args: &ValidateArgs) -> Result<(), StrongmanError> {
    let loader = ConfigLoader::new();
    let mut first_error = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");

        let outcome = loader.load(path).and_then(|result| {
            for warning in &result.warnings {
                tracing::warn!(
                    location = warning.location.as_deref().unwrap_or("<unknown>"),
                    "{}",
                    warning.message
                );
            }
            if args.strict && !result.warnings.is_empty() {
                return Err(ConfigError::ValidationError {
                    path: path.display().to_string(),
                    errors: result.warnings.iter().map(strict_issue).collect(),
                });
            }
            Ok(())
        });

        match outcome {
            Ok(()) => tracing::info!(file = %path.display(), "configuration valid"),
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "configuration invalid");
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

fn strict_issue(warning: &LoadWarning) -> ValidationIssue {
    ValidationIssue {
        path: warning.location.clone().unwrap_or_default(),
        message: warning.message.clone(),
        severity: Severity::Warning,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    fn args(files: Vec<PathBuf>, strict: bool) -> ValidateArgs {
        ValidateArgs { files, strict }
    }

    #[test]
    fn test_valid_file_passes() {
        let f = file("timing:\n  sampling_window: 4s\n");
        assert!(validate(&args(vec![f.path().to_path_buf()], false)).is_ok());
    }

    #[test]
    fn test_warnings_fail_only_when_strict() {
        let f = file("streams:\n  active: 1\n");
        let files = vec![f.path().to_path_buf()];
        assert!(validate(&args(files.clone(), false)).is_ok());

        let err = validate(&args(files, true)).unwrap_err();
        assert!(matches!(
            err,
            StrongmanError::Config(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_reports_first_failure_after_checking_all() {
        let good = file("");
        let missing = PathBuf::from("/nonexistent/strongman.yaml");
        let err = validate(&args(vec![missing, good.path().to_path_buf()], false)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }
}

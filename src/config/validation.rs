//! Semantic validation of a deserialized [`GameConfig`].
//!
//! Collects every issue instead of stopping at the first one.

use std::collections::HashMap;

use crate::config::schema::{BarGeometry, GameConfig};
use crate::error::{Severity, ValidationIssue};
use crate::game::phase::Player;
use crate::overlay::score::Calibration;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config`.
    pub fn validate(&mut self, config: &GameConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_timing(config);
        self.validate_streams(config);
        for player in Player::ALL {
            self.validate_calibration(player, config.calibration.for_player(player));
            self.validate_bar(player, config.overlay.bar(player));
        }
        self.validate_screen(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_timing(&mut self, config: &GameConfig) {
        let timing = &config.timing;
        if timing.render_interval.is_zero() {
            self.add_error("timing.render_interval", "must be non-zero");
        }
        if timing.idle_timeout.is_zero() {
            self.add_error("timing.idle_timeout", "must be non-zero");
        }
        if timing.sampling_window.is_zero() {
            self.add_warning(
                "timing.sampling_window",
                "zero sampling window settles the match on entry",
            );
        }
        if timing.render_interval > timing.sampling_window && !timing.sampling_window.is_zero() {
            self.add_warning(
                "timing.render_interval",
                "longer than the sampling window; bars may not update during play",
            );
        }
    }

    fn validate_streams(&mut self, config: &GameConfig) {
        let mut seen: HashMap<u32, &'static str> = HashMap::new();
        for (name, id) in config.streams.entries() {
            if let Some(first) = seen.insert(id.0, name) {
                self.add_warning(
                    &format!("streams.{name}"),
                    &format!("shares stream id {id} with streams.{first}; the player will not restart between them"),
                );
            }
        }
    }

    fn validate_calibration(&mut self, player: Player, cal: &Calibration) {
        let base = format!("calibration.{}", player.as_str());
        for (field, value) in [
            ("amplitude", cal.amplitude),
            ("offset", cal.offset),
            ("rate", cal.rate),
            ("divisor", cal.divisor),
            ("base", cal.base),
        ] {
            if !value.is_finite() {
                self.add_error(&format!("{base}.{field}"), "must be a finite number");
            }
        }
        for (field, value) in [
            ("amplitude", cal.amplitude),
            ("rate", cal.rate),
            ("divisor", cal.divisor),
        ] {
            if value.is_finite() && value <= 0.0 {
                self.add_error(
                    &format!("{base}.{field}"),
                    "must be positive so the score rises with effort",
                );
            }
        }
    }

    fn validate_bar(&mut self, player: Player, bar: &BarGeometry) {
        let base = format!("overlay.{}", player.as_str());
        for (field, value) in [
            ("across", bar.across),
            ("down", bar.down),
            ("width", bar.width),
            ("max_height", bar.max_height),
        ] {
            if !(0.0..=100.0).contains(&value) {
                self.add_error(&format!("{base}.{field}"), "must be a percentage in 0..=100");
            }
        }
        if bar.width <= 0.0 || bar.max_height <= 0.0 {
            self.add_warning(&base, "bar has no visible area");
        }
        if bar.across + bar.width > 100.0 {
            self.add_warning(&base, "bar extends past the right edge of the screen");
        }
        if bar.max_height > bar.down {
            self.add_warning(&base, "full-height bar extends past the top of the screen");
        }
    }

    fn validate_screen(&mut self, config: &GameConfig) {
        if config.overlay.screen_width == 0 {
            self.add_error("overlay.screen_width", "must be non-zero");
        }
        if config.overlay.screen_height == 0 {
            self.add_error("overlay.screen_height", "must be non-zero");
        }
        if config.overlay.opacity == 0 {
            self.add_warning("overlay.opacity", "bars are fully transparent");
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::schema::StreamId;

    fn validate(config: &GameConfig) -> ValidationResult {
        Validator::new().validate(config)
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_default_config_is_clean() {
        let result = validate(&GameConfig::default());
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_zero_render_interval_is_error() {
        let mut config = GameConfig::default();
        config.timing.render_interval = Duration::ZERO;
        let result = validate(&config);
        assert!(result.has_errors());
        assert_eq!(paths(&result.errors), vec!["timing.render_interval"]);
    }

    #[test]
    fn test_non_positive_divisor_is_error() {
        let mut config = GameConfig::default();
        config.calibration.player2.divisor = 0.0;
        config.calibration.player1.rate = -1.0;
        let result = validate(&config);
        let found = paths(&result.errors);
        assert!(found.contains(&"calibration.player2.divisor"));
        assert!(found.contains(&"calibration.player1.rate"));
    }

    #[test]
    fn test_nan_calibration_is_error() {
        let mut config = GameConfig::default();
        config.calibration.player1.offset = f64::NAN;
        let result = validate(&config);
        assert_eq!(paths(&result.errors), vec!["calibration.player1.offset"]);
    }

    #[test]
    fn test_duplicate_stream_ids_warn() {
        let mut config = GameConfig::default();
        config.streams.winner_p2 = StreamId(3);
        let result = validate(&config);
        assert!(!result.has_errors());
        assert_eq!(paths(&result.warnings), vec!["streams.winner_p2"]);
        assert!(result.warnings[0].message.contains("winner_p1"));
    }

    #[test]
    fn test_geometry_out_of_range() {
        let mut config = GameConfig::default();
        config.overlay.player1.across = 120.0;
        config.overlay.player2.max_height = -5.0;
        let result = validate(&config);
        let found = paths(&result.errors);
        assert!(found.contains(&"overlay.player1.across"));
        assert!(found.contains(&"overlay.player2.max_height"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GameConfig::default();
        config.timing.render_interval = Duration::ZERO;
        config.timing.idle_timeout = Duration::ZERO;
        config.overlay.screen_width = 0;
        assert_eq!(validate(&config).errors.len(), 3);
    }
}

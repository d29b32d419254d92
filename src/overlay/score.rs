//! Weighted strength scores.

use serde::{Deserialize, Serialize};

/// Lowest weighted score.
pub const MIN_SCORE: u8 = 1;

/// Highest weighted score.
pub const MAX_SCORE: u8 = 99;

/// Per-sensor calibration of the saturation curve
/// `amplitude · (1 − e^(−(raw − offset)·rate / divisor)) + base`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Calibration {
    /// Curve height (A)
    pub amplitude: f64,
    /// Raw reading treated as zero effort
    pub offset: f64,
    /// Curve steepness (k)
    pub rate: f64,
    /// Curve scale (D)
    pub divisor: f64,
    /// Constant added after the curve
    pub base: f64,
}

impl Calibration {
    /// Unclamped curve value for `raw`.
    #[must_use]
    pub fn curve(&self, raw: u8) -> f64 {
        let effort = f64::from(raw) - self.offset;
        self.amplitude.mul_add(
            1.0 - (-effort * self.rate / self.divisor).exp(),
            self.base,
        )
    }

    /// Weighted score for `raw`, truncated and clamped to `1..=99`.
    ///
    /// A non-finite curve value (degenerate calibration) maps to the
    /// minimum score.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn weighted_score(&self, raw: u8) -> u8 {
        let value = self.curve(raw);
        if value.is_nan() {
            return MIN_SCORE;
        }
        value.clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
    }
}

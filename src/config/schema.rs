//! Configuration schema.
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration that reproduces the stock cabinet.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game::phase::{Phase, Player};
use crate::overlay::score::Calibration;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    /// Phase timing
    pub timing: TimingConfig,
    /// Stream id per phase
    pub streams: StreamTable,
    /// Per-player weighted-score calibration
    pub calibration: CalibrationConfig,
    /// Power-bar overlay layout
    pub overlay: OverlayConfig,
    /// Sensor bus settings
    pub bus: BusConfig,
}

// ============================================================================
// Timing
// ============================================================================

/// Dwell times and polling intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Upper bound on a single Idle wait before the idle stream is re-asserted.
    #[serde(with = "duration_str")]
    pub idle_timeout: Duration,

    /// Minimum time spent in Countdown before its loop boundary is honoured.
    #[serde(with = "duration_str")]
    pub countdown_dwell: Duration,

    /// How long strength readings are sampled during Active.
    #[serde(with = "duration_str")]
    pub sampling_window: Duration,

    /// How long the winner lamp stays lit.
    #[serde(with = "duration_str")]
    pub winner_dwell: Duration,

    /// Overlay refresh period while Active.
    #[serde(with = "duration_str")]
    pub render_interval: Duration,

    /// Pause after a failed bus read.
    #[serde(with = "duration_str")]
    pub bus_retry_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(18),
            countdown_dwell: Duration::ZERO,
            sampling_window: Duration::from_secs(5),
            winner_dwell: Duration::from_secs(5),
            render_interval: Duration::from_millis(40),
            bus_retry_delay: Duration::from_millis(10),
        }
    }
}

// ============================================================================
// Streams
// ============================================================================

/// Identifier of a media stream inside the playback container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u32);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which stream the media player shows in each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamTable {
    /// Attract loop
    pub idle: StreamId,
    /// Countdown clip
    pub countdown: StreamId,
    /// Gameplay clip
    pub active: StreamId,
    /// Player-1 victory clip
    pub winner_p1: StreamId,
    /// Player-2 victory clip
    pub winner_p2: StreamId,
}

impl StreamTable {
    /// Stream for `phase`.
    #[must_use]
    pub const fn stream_for(&self, phase: Phase) -> StreamId {
        match phase {
            Phase::Idle => self.idle,
            Phase::Countdown => self.countdown,
            Phase::Active => self.active,
            Phase::Winner(Player::One) => self.winner_p1,
            Phase::Winner(Player::Two) => self.winner_p2,
        }
    }

    /// All entries as `(name, id)` pairs.
    #[must_use]
    pub const fn entries(&self) -> [(&'static str, StreamId); 5] {
        [
            ("idle", self.idle),
            ("countdown", self.countdown),
            ("active", self.active),
            ("winner_p1", self.winner_p1),
            ("winner_p2", self.winner_p2),
        ]
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self {
            idle: StreamId(0),
            countdown: StreamId(1),
            active: StreamId(2),
            winner_p1: StreamId(3),
            winner_p2: StreamId(4),
        }
    }
}

// ============================================================================
// Calibration
// ============================================================================

/// Calibration for both strength sensors.
///
/// The two sensors are mechanically different, so the defaults differ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    /// Left sensor
    pub player1: Calibration,
    /// Right sensor
    pub player2: Calibration,
}

impl CalibrationConfig {
    /// Calibration for `player`.
    #[must_use]
    pub const fn for_player(&self, player: Player) -> &Calibration {
        match player {
            Player::One => &self.player1,
            Player::Two => &self.player2,
        }
    }

    /// Both calibrations, indexed by player.
    #[must_use]
    pub const fn as_array(&self) -> [Calibration; 2] {
        [self.player1, self.player2]
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            player1: Calibration {
                amplitude: 100.0,
                offset: 0.0,
                rate: 1.0,
                divisor: 80.0,
                base: 0.0,
            },
            player2: Calibration {
                amplitude: 104.0,
                offset: 6.0,
                rate: 1.0,
                divisor: 72.0,
                base: 1.0,
            },
        }
    }
}

// ============================================================================
// Overlay
// ============================================================================

/// Screen-space layout of the power bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Display width in pixels
    pub screen_width: u32,
    /// Display height in pixels
    pub screen_height: u32,
    /// Layer opacity (0 transparent, 255 opaque)
    pub opacity: u8,
    /// Bar colour as `[r, g, b]`
    pub colour: [u8; 3],
    /// Left bar
    pub player1: BarGeometry,
    /// Right bar
    pub player2: BarGeometry,
}

impl OverlayConfig {
    /// Bar geometry for `player`.
    #[must_use]
    pub const fn bar(&self, player: Player) -> &BarGeometry {
        match player {
            Player::One => &self.player1,
            Player::Two => &self.player2,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            opacity: 255,
            colour: [128, 0, 0],
            player1: BarGeometry {
                across: 3.0,
                down: 98.0,
                width: 12.0,
                max_height: 94.0,
                style: BarStyle::Tapered,
            },
            player2: BarGeometry {
                across: 85.0,
                down: 98.0,
                width: 12.0,
                max_height: 94.0,
                style: BarStyle::Solid,
            },
        }
    }
}

/// Bar placement in percent of the screen.
///
/// `across`/`down` locate the bottom-left corner of the bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BarGeometry {
    /// Left edge, percent of screen width
    pub across: f32,
    /// Bottom edge, percent of screen height
    pub down: f32,
    /// Bar width, percent of screen width
    pub width: f32,
    /// Full-scale bar height, percent of screen height
    pub max_height: f32,
    /// Bar outline
    #[serde(default)]
    pub style: BarStyle,
}

/// Shape of a power bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarStyle {
    /// Full width at every height
    #[default]
    Solid,
    /// Narrow at the bottom, widening towards the top
    Tapered,
}

// ============================================================================
// Bus
// ============================================================================

/// Sensor bus settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Serial device carrying the sensor bus (e.g. `/dev/ttyAMA0`)
    pub device: Option<PathBuf>,
}

// ============================================================================
// Duration helpers
// ============================================================================

/// Serializes `Duration` as a humantime string (`"18s"`, `"250ms"`).
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

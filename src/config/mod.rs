//! Configuration: YAML schema, loader, and validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning};
pub use schema::{
    BarGeometry, BarStyle, BusConfig, CalibrationConfig, GameConfig, OverlayConfig, StreamId,
    StreamTable, TimingConfig,
};
pub use validation::{ValidationResult, Validator};

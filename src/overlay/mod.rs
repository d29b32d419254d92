//! Live power-bar overlay.

pub mod compositor;
pub mod image;
pub mod renderer;
pub mod score;

pub use compositor::{Compositor, HeadlessCompositor, LayerHandle, LayerPair};
pub use image::{BarImage, Canvas};
pub use renderer::OverlayRenderer;
pub use score::{Calibration, MAX_SCORE, MIN_SCORE};

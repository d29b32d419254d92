//! Power-bar images.
//!
//! A bar is drawn into its own RGBA buffer sized to the bar's bounding box.
//! Placement and size are given in percent of the screen; the bar grows
//! upwards from its bottom edge. Every row is shaded so the outer eighth on
//! each side fades to black, which gives the bar a rounded look.

use crate::config::schema::{BarGeometry, BarStyle};
use crate::error::RenderError;

use super::score::MAX_SCORE;

/// Bytes per pixel (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// An off-screen RGBA image plus its screen position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarImage {
    /// Left edge in screen pixels
    pub x: u32,
    /// Top edge in screen pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGBA pixels, top row first
    pub pixels: Vec<u8>,
}

/// Screen and colour settings shared by both bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    /// Screen width in pixels
    pub screen_width: u32,
    /// Screen height in pixels
    pub screen_height: u32,
    /// Bar colour
    pub colour: [u8; 3],
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_of(percent: f32, extent: u32) -> u32 {
    let px = f64::from(percent.clamp(0.0, 100.0)) * f64::from(extent) / 100.0;
    px as u32
}

/// Intensity factor for column `x` of a row `width` pixels wide.
///
/// Ramps from 0 to 1 over the outer eighth on each side.
fn edge_shade(x: u32, width: u32) -> f64 {
    let eighth = f64::from(width) / 8.0;
    if eighth <= 0.0 {
        return 1.0;
    }
    let from_edge = f64::from(x.min(width - 1 - x));
    (from_edge / eighth).min(1.0)
}

impl BarImage {
    /// Draws the bar for `score` (`1..=99`).
    ///
    /// A score of 99 fills the geometry's full height; lower scores scale
    /// linearly.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ImageAllocation`] if the pixel buffer cannot
    /// be allocated.
    pub fn render(geometry: &BarGeometry, canvas: &Canvas, score: u8) -> Result<Self, RenderError> {
        let width = percent_of(geometry.width, canvas.screen_width).max(1);
        let full_height = percent_of(geometry.max_height, canvas.screen_height).max(1);
        let height = (u64::from(full_height) * u64::from(score.min(MAX_SCORE))
            / u64::from(MAX_SCORE))
        .max(1);
        let height = u32::try_from(height).unwrap_or(full_height);

        let bottom = percent_of(geometry.down, canvas.screen_height);
        let x = percent_of(geometry.across, canvas.screen_width);
        let y = bottom.saturating_sub(height);

        let mut pixels = allocate(width, height)?;
        let row_bytes = width as usize * BYTES_PER_PIXEL;

        for row in 0..height {
            // Distance from the bottom edge, 0 for the lowest row.
            let level = height - 1 - row;
            let row_width = match geometry.style {
                BarStyle::Solid => width,
                BarStyle::Tapered => {
                    let w = u64::from(width) * u64::from(level + 1) / u64::from(full_height);
                    u32::try_from(w).unwrap_or(width).clamp(1, width)
                }
            };

            let start = row as usize * row_bytes;
            for col in 0..row_width {
                let shade = edge_shade(col, row_width);
                let offset = start + col as usize * BYTES_PER_PIXEL;
                let px = &mut pixels[offset..offset + BYTES_PER_PIXEL];
                for (channel, value) in px.iter_mut().zip(canvas.colour) {
                    *channel = scale(value, shade);
                }
                px[3] = u8::MAX;
            }
        }

        Ok(Self {
            x,
            y,
            width,
            height,
            pixels,
        })
    }

    /// RGBA value at `(col, row)`, if inside the image.
    #[must_use]
    pub fn pixel(&self, col: u32, row: u32) -> Option<[u8; 4]> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let offset = (row as usize * self.width as usize + col as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(value: u8, factor: f64) -> u8 {
    (f64::from(value) * factor).round().clamp(0.0, 255.0) as u8
}

/// Allocates a zeroed (fully transparent) buffer, reporting failure
/// instead of aborting.
fn allocate(width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or(RenderError::ImageAllocation { bytes: usize::MAX })?;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(bytes)
        .map_err(|_| RenderError::ImageAllocation { bytes })?;
    pixels.resize(bytes, 0);
    Ok(pixels)
}

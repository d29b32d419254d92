//! Overlay renderer task.
//!
//! Sleeps until the engine raises start-overlay, then redraws both power
//! bars from the live readings at the configured interval until
//! finish-overlay is observed, and finally releases every layer it created.
//! While pause-overlay is raised the bars are frozen.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::compositor::{Compositor, LayerPair};
use super::image::{BarImage, Canvas};
use super::score::Calibration;
use crate::config::schema::{GameConfig, OverlayConfig};
use crate::error::RenderError;
use crate::game::phase::Player;
use crate::game::state::MatchState;
use crate::observability::metrics;

/// Draws the power-bar overlay through a [`Compositor`].
pub struct OverlayRenderer<C: ?Sized> {
    state: Arc<MatchState>,
    compositor: Arc<C>,
    overlay: OverlayConfig,
    calibration: [Calibration; 2],
    interval: Duration,
}

impl<C> OverlayRenderer<C>
where
    C: Compositor + ?Sized,
{
    /// Creates a renderer for `state` drawing through `compositor`.
    #[must_use]
    pub fn new(state: Arc<MatchState>, compositor: Arc<C>, config: &GameConfig) -> Self {
        Self {
            state,
            compositor,
            overlay: config.overlay.clone(),
            calibration: config.calibration.as_array(),
            interval: config.timing.render_interval,
        }
    }

    /// Serves overlay sessions until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the first [`RenderError`]; image allocation and compositor
    /// failures are fatal. Layers are released before returning.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), RenderError> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("overlay renderer cancelled");
                    return Ok(());
                }
                () = self.state.wait_overlay(|data| data.overlay.start) => {}
            }
            self.state.acknowledge_overlay_start();
            info!("overlay started");
            self.session(&cancel).await?;
        }
    }

    /// One start-to-finish overlay session.
    async fn session(&self, cancel: &CancellationToken) -> Result<(), RenderError> {
        let mut pairs = [LayerPair::new(), LayerPair::new()];
        let outcome = self.draw_until_finish(&mut pairs, cancel).await;

        let mut released = Ok(());
        for pair in &mut pairs {
            if let Err(e) = pair.teardown(&*self.compositor) {
                warn!(error = %e, "failed to release overlay layer");
                released = Err(e);
            }
        }
        self.state.acknowledge_overlay_finish();
        info!("overlay finished");
        outcome.and(released)
    }

    async fn draw_until_finish(
        &self,
        pairs: &mut [LayerPair; 2],
        cancel: &CancellationToken,
    ) -> Result<(), RenderError> {
        let canvas = Canvas {
            screen_width: self.overlay.screen_width,
            screen_height: self.overlay.screen_height,
            colour: self.overlay.colour,
        };
        let mut drawn: [Option<u8>; 2] = [None, None];

        loop {
            let (readings, flags) = self.state.overlay_view();

            if !flags.pause {
                let scores = [
                    self.calibration[0].weighted_score(readings[0]),
                    self.calibration[1].weighted_score(readings[1]),
                ];
                self.state.publish_live_scores(scores);

                for player in Player::ALL {
                    let i = player.index();
                    if drawn[i] == Some(scores[i]) {
                        continue;
                    }
                    let image = BarImage::render(self.overlay.bar(player), &canvas, scores[i])?;
                    pairs[i].present(&*self.compositor, &image, self.overlay.opacity)?;
                    metrics::record_overlay_swap();
                    drawn[i] = Some(scores[i]);
                }
            }

            if flags.finish {
                return Ok(());
            }

            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(self.interval) => {}
                () = self.state.wait_overlay(|data| data.overlay.finish) => {}
            }
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for OverlayRenderer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

//! Match engine.
//!
//! The only writer of the match phase. Each phase dwells until its exit
//! condition, then [`MatchState::advance`] applies the transition table and
//! selects the next stream under the state lock. Playback loop boundaries
//! from the media player are the engine's clock: if they stop arriving the
//! engine stalls in its current phase. Idle is the exception: its wait is
//! bounded by a timeout, after which the transition is applied anyway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::phase::{Phase, Player};
use super::state::{MatchState, PhaseChange};
use crate::bus::LampSender;
use crate::config::schema::GameConfig;
use crate::observability::{Event, EventEmitter, metrics};

/// How a phase dwell ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dwell {
    Done,
    Cancelled,
}

/// Sequences matches through their phases.
pub struct MatchEngine {
    state: Arc<MatchState>,
    config: Arc<GameConfig>,
    lamps: LampSender,
    events: Arc<EventEmitter>,
    start_epoch: u64,
}

impl MatchEngine {
    /// Creates an engine driving `state` and the winner lamps.
    #[must_use]
    pub fn new(
        state: Arc<MatchState>,
        config: Arc<GameConfig>,
        lamps: LampSender,
        events: Arc<EventEmitter>,
    ) -> Self {
        let start_epoch = state.loop_epoch();
        Self {
            state,
            config,
            lamps,
            events,
            start_epoch,
        }
    }

    /// Runs matches until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut entered_epoch = self.start_epoch;
        info!(phase = %self.state.phase(), "match engine started");

        loop {
            let phase = self.state.phase();
            let dwell = match phase {
                Phase::Idle => self.idle(entered_epoch, &cancel).await,
                Phase::Countdown => {
                    self.dwell_then_boundary(
                        self.config.timing.countdown_dwell,
                        entered_epoch,
                        &cancel,
                    )
                    .await
                }
                Phase::Active => self.active(entered_epoch, &cancel).await,
                Phase::Winner(player) => self.winner(player, entered_epoch, &cancel).await,
            };
            if dwell == Dwell::Cancelled {
                debug!(%phase, "match engine cancelled");
                break;
            }

            let change = self.state.advance(&self.config.streams);
            entered_epoch = change.epoch;
            self.report(change);
        }
    }

    fn report(&self, change: PhaseChange) {
        if change.from == change.to {
            debug!(phase = %change.to, stream = %change.stream, "phase re-asserted");
            return;
        }
        info!(
            from = %change.from,
            to = %change.to,
            stream = %change.stream,
            "phase transition"
        );
        metrics::record_phase_transition(change.from, change.to);
        self.events.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            from: change.from.as_str().to_owned(),
            phase: change.to.as_str().to_owned(),
            stream: change.stream.0,
        });
    }

    /// Waits for the loop boundary after `entered_epoch`, bounded by the idle
    /// timeout. A start press is only acted on at that boundary.
    async fn idle(&self, entered_epoch: u64, cancel: &CancellationToken) -> Dwell {
        let woken = self.state.wait_loop_boundary(entered_epoch);
        tokio::select! {
            () = cancel.cancelled() => Dwell::Cancelled,
            result = tokio::time::timeout(self.config.timing.idle_timeout, woken) => {
                if result.is_err() {
                    debug!("idle timeout without a loop boundary");
                }
                Dwell::Done
            }
        }
    }

    /// Sleeps for `duration`, then waits for the next loop boundary.
    ///
    /// With no dwell, a boundary delivered since the phase was entered at
    /// `entered_epoch` already counts.
    async fn dwell_then_boundary(
        &self,
        duration: Duration,
        entered_epoch: u64,
        cancel: &CancellationToken,
    ) -> Dwell {
        match self.boundary_epoch(duration, entered_epoch, cancel).await {
            Some(epoch) => self.loop_boundary_after(epoch, cancel).await,
            None => Dwell::Cancelled,
        }
    }

    /// Epoch the closing loop boundary must follow, after sleeping for
    /// `duration`. `None` if cancelled.
    async fn boundary_epoch(
        &self,
        duration: Duration,
        entered_epoch: u64,
        cancel: &CancellationToken,
    ) -> Option<u64> {
        if duration.is_zero() {
            return Some(entered_epoch);
        }
        match self.sleep(duration, cancel).await {
            Dwell::Done => Some(self.state.loop_epoch()),
            Dwell::Cancelled => None,
        }
    }

    /// Samples readings for the configured window, settles the match, and
    /// closes the overlay on the following loop boundary.
    async fn active(&self, entered_epoch: u64, cancel: &CancellationToken) -> Dwell {
        self.state.raise_overlay_start();

        let window = self.config.timing.sampling_window;
        let Some(epoch) = self.boundary_epoch(window, entered_epoch, cancel).await else {
            self.state.raise_overlay_finish();
            return Dwell::Cancelled;
        };

        let (scores, winner) = self.state.settle(&self.config.calibration.as_array());
        info!(%winner, p1 = scores[0], p2 = scores[1], "match settled");
        metrics::record_match(winner, scores);
        self.events.emit(Event::WinnerDecided {
            timestamp: Utc::now(),
            winner: winner.as_str().to_owned(),
            scores,
        });

        let dwell = self.loop_boundary_after(epoch, cancel).await;
        self.state.raise_overlay_finish();
        dwell
    }

    /// Lights the winner's lamp for the dwell, then waits for the loop to
    /// finish before switching it off.
    async fn winner(&self, player: Player, entered_epoch: u64, cancel: &CancellationToken) -> Dwell {
        self.set_lamp(player, true);
        let dwell = self
            .dwell_then_boundary(self.config.timing.winner_dwell, entered_epoch, cancel)
            .await;
        self.set_lamp(player, false);
        dwell
    }

    fn set_lamp(&self, player: Player, on: bool) {
        if let Err(e) = self.lamps.set_lamp(player.index(), on) {
            warn!(error = %e, %player, on, "failed to queue lamp packet");
        }
    }

    async fn loop_boundary_after(&self, epoch: u64, cancel: &CancellationToken) -> Dwell {
        tokio::select! {
            () = cancel.cancelled() => Dwell::Cancelled,
            () = self.state.wait_loop_boundary(epoch) => Dwell::Done,
        }
    }

    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Dwell {
        if duration.is_zero() {
            return Dwell::Done;
        }
        tokio::select! {
            () = cancel.cancelled() => Dwell::Cancelled,
            () = tokio::time::sleep(duration) => Dwell::Done,
        }
    }
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ControlPacket, lamp_channel};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    struct Harness {
        state: Arc<MatchState>,
        config: Arc<GameConfig>,
        lamps: mpsc::UnboundedReceiver<ControlPacket>,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn start(config: GameConfig) -> Harness {
        let config = Arc::new(config);
        let state = Arc::new(MatchState::new(config.streams.idle));
        let (sender, lamps) = lamp_channel();
        let cancel = CancellationToken::new();
        let engine = MatchEngine::new(
            Arc::clone(&state),
            Arc::clone(&config),
            sender,
            Arc::new(EventEmitter::noop()),
        );
        let handle = tokio::spawn(engine.run(cancel.clone()));
        Harness {
            state,
            config,
            lamps,
            cancel,
            handle,
        }
    }

    impl Harness {
        async fn wait_phase(&self, phase: Phase) {
            self.state.wait_state(|d| d.phase == phase).await;
        }

        /// Presses start and delivers the loop boundary that acts on it.
        async fn begin_countdown(&self) {
            assert!(self.state.request_start());
            self.state.signal_loop_boundary();
            self.wait_phase(Phase::Countdown).await;
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_press_enters_countdown_on_boundary() {
        let h = start(GameConfig::default());
        assert!(h.state.request_start());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.state.phase(), Phase::Idle);

        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Countdown).await;

        let data = h.state.snapshot();
        assert_eq!(data.active_stream, h.config.streams.countdown);
        assert!(!data.start_requested);
        assert!(!data.allow_start);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_loop_boundary_without_start_stays_idle() {
        let h = start(GameConfig::default());
        tokio::task::yield_now().await;
        h.state.signal_loop_boundary();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.state.phase(), Phase::Idle);
        assert_eq!(h.state.active_stream(), h.config.streams.idle);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_reasserts_idle() {
        let h = start(GameConfig::default());
        h.state.lock().active_stream = h.config.streams.winner_p1;
        tokio::time::sleep(h.config.timing.idle_timeout + Duration::from_millis(1)).await;
        assert_eq!(h.state.phase(), Phase::Idle);
        assert_eq!(h.state.active_stream(), h.config.streams.idle);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_waits_for_loop_boundary() {
        let h = start(GameConfig::default());
        h.begin_countdown().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.state.phase(), Phase::Countdown);

        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Active).await;
        assert_eq!(h.state.active_stream(), h.config.streams.active);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_match_player_one_wins() {
        let mut h = start(GameConfig::default());
        h.begin_countdown().await;
        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Active).await;
        assert!(h.state.snapshot().overlay.start);

        h.state.record_reading(Player::One, 129);
        h.state.record_reading(Player::Two, 40);
        tokio::time::sleep(h.config.timing.sampling_window + Duration::from_millis(1)).await;

        let data = h.state.snapshot();
        assert!(data.overlay.pause);
        assert_eq!(data.scores, [80, 40]);
        assert_eq!(data.winner, Some(Player::One));
        assert_eq!(data.phase, Phase::Active);

        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Winner(Player::One)).await;
        let data = h.state.snapshot();
        assert!(data.overlay.finish);
        assert!(!data.allow_start);
        assert_eq!(data.active_stream, h.config.streams.winner_p1);
        assert_eq!(h.lamps.recv().await, Some(ControlPacket::lamp(0, true)));

        tokio::time::sleep(h.config.timing.winner_dwell + Duration::from_millis(1)).await;
        assert!(h.lamps.try_recv().is_err());
        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Idle).await;
        assert_eq!(h.lamps.recv().await, Some(ControlPacket::lamp(0, false)));
        let data = h.state.snapshot();
        assert!(data.allow_start);
        assert_eq!(data.active_stream, h.config.streams.idle);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tie_goes_to_player_two() {
        let mut h = start(GameConfig::default());
        h.begin_countdown().await;
        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Active).await;

        tokio::time::sleep(h.config.timing.sampling_window + Duration::from_millis(1)).await;
        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Winner(Player::Two)).await;
        assert_eq!(h.lamps.recv().await, Some(ControlPacket::lamp(1, true)));
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_presses_ignored_until_idle() {
        let h = start(GameConfig::default());
        h.begin_countdown().await;
        assert!(!h.state.request_start());
        h.state.signal_loop_boundary();
        h.wait_phase(Phase::Active).await;
        assert!(!h.state.request_start());
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_winner_turns_lamp_off() {
        let mut h = start(GameConfig::default());
        // Set before the engine task first runs.
        h.state.lock().phase = Phase::Winner(Player::Two);
        assert_eq!(h.lamps.recv().await, Some(ControlPacket::lamp(1, true)));

        h.cancel.cancel();
        assert_eq!(h.lamps.recv().await, Some(ControlPacket::lamp(1, false)));
        h.handle.await.unwrap();
    }

    fn idle_engine(state: &Arc<MatchState>) -> MatchEngine {
        let (sender, _lamps) = lamp_channel();
        MatchEngine::new(
            Arc::clone(state),
            Arc::new(GameConfig::default()),
            sender,
            Arc::new(EventEmitter::noop()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_since_entry_counts_without_dwell() {
        let state = Arc::new(MatchState::new(GameConfig::default().streams.idle));
        let engine = idle_engine(&state);
        let entered = state.loop_epoch();

        // Delivered after the phase was entered but before the engine waits.
        state.signal_loop_boundary();
        let dwell = tokio::time::timeout(
            Duration::from_secs(1),
            engine.dwell_then_boundary(Duration::ZERO, entered, &CancellationToken::new()),
        )
        .await
        .unwrap();
        assert_eq!(dwell, Dwell::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_during_dwell_does_not_count() {
        let state = Arc::new(MatchState::new(GameConfig::default().streams.idle));
        let engine = idle_engine(&state);
        let entered = state.loop_epoch();

        state.signal_loop_boundary();
        let waited = tokio::time::timeout(
            Duration::from_secs(10),
            engine.dwell_then_boundary(Duration::from_secs(2), entered, &CancellationToken::new()),
        )
        .await;
        assert!(waited.is_err());
    }
}

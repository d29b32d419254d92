//! Shared match state.
//!
//! All mutable match data sits behind one `std::sync::Mutex` that is only
//! held for short, non-async critical sections, so it can also be taken
//! from the media player's own thread. Waiters are woken through two
//! broadcast conditions: `state_changed` (start presses and loop
//! boundaries) and `overlay_changed` (overlay lifecycle flags).

use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::phase::{Phase, Player, decide_winner, next_phase};
use crate::config::schema::{StreamId, StreamTable};
use crate::overlay::score::Calibration;

/// Overlay lifecycle flags raised by the engine and acknowledged by the
/// renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayFlags {
    /// Rendering should begin
    pub start: bool,
    /// Bar geometry is frozen
    pub pause: bool,
    /// Rendering should end and layers be released
    pub finish: bool,
}

/// The guarded aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchData {
    /// Last raw strength sample per player
    pub readings: [u8; 2],
    /// Weighted score per player (live while Active, settled at pause)
    pub scores: [u8; 2],
    /// Current phase; written only by the match engine
    pub phase: Phase,
    /// A start press is pending
    pub start_requested: bool,
    /// Start presses are accepted
    pub allow_start: bool,
    /// Overlay lifecycle
    pub overlay: OverlayFlags,
    /// Winner of the last settled match
    pub winner: Option<Player>,
    /// Stream the media player should be showing
    pub active_stream: StreamId,
    /// Number of loop boundaries signalled so far
    pub loop_epoch: u64,
}

/// A phase change applied by [`MatchState::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    /// Phase that was left
    pub from: Phase,
    /// Phase that was entered
    pub to: Phase,
    /// Stream selected for `to`
    pub stream: StreamId,
    /// Loop epoch at the moment of the change
    pub epoch: u64,
}

/// Mutex-guarded match state with broadcast conditions.
#[derive(Debug)]
pub struct MatchState {
    data: Mutex<MatchData>,
    state_changed: Notify,
    overlay_changed: Notify,
}

impl MatchState {
    /// Creates the boot state: Idle, starts allowed, showing `idle_stream`.
    #[must_use]
    pub fn new(idle_stream: StreamId) -> Self {
        Self {
            data: Mutex::new(MatchData {
                readings: [0; 2],
                scores: [0; 2],
                phase: Phase::Idle,
                start_requested: false,
                allow_start: true,
                overlay: OverlayFlags::default(),
                winner: None,
                active_stream: idle_stream,
                loop_epoch: 0,
            }),
            state_changed: Notify::new(),
            overlay_changed: Notify::new(),
        }
    }

    /// Locks the state. A poisoned lock is recovered; every critical section
    /// leaves the data consistent.
    pub fn lock(&self) -> MutexGuard<'_, MatchData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the whole aggregate.
    #[must_use]
    pub fn snapshot(&self) -> MatchData {
        self.lock().clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Stream the media player should show.
    #[must_use]
    pub fn active_stream(&self) -> StreamId {
        self.lock().active_stream
    }

    /// Loop boundaries seen so far.
    #[must_use]
    pub fn loop_epoch(&self) -> u64 {
        self.lock().loop_epoch
    }

    // ------------------------------------------------------------------
    // Packet processor
    // ------------------------------------------------------------------

    /// Handles a start press. Returns whether it was accepted.
    pub fn request_start(&self) -> bool {
        let accepted = {
            let mut data = self.lock();
            if data.allow_start {
                data.start_requested = true;
                data.allow_start = false;
                true
            } else {
                false
            }
        };
        if accepted {
            self.state_changed.notify_waiters();
        }
        accepted
    }

    /// Stores the latest sample for `player`. Last write wins.
    pub fn record_reading(&self, player: Player, value: u8) {
        self.lock().readings[player.index()] = value;
    }

    // ------------------------------------------------------------------
    // Media player
    // ------------------------------------------------------------------

    /// Records a playback loop boundary and wakes the engine.
    pub fn signal_loop_boundary(&self) -> u64 {
        let epoch = {
            let mut data = self.lock();
            data.loop_epoch += 1;
            data.loop_epoch
        };
        self.state_changed.notify_waiters();
        epoch
    }

    // ------------------------------------------------------------------
    // Match engine
    // ------------------------------------------------------------------

    /// Evaluates the transition table and applies the result, selecting the
    /// new phase's stream under the same lock.
    pub fn advance(&self, streams: &StreamTable) -> PhaseChange {
        let change = {
            let mut data = self.lock();
            let transition = next_phase(data.phase, data.start_requested, data.scores);
            if transition.clear_start {
                data.start_requested = false;
            }
            if transition.allow_start {
                data.allow_start = true;
            }
            let from = data.phase;
            data.phase = transition.to;
            data.active_stream = streams.stream_for(transition.to);
            PhaseChange {
                from,
                to: transition.to,
                stream: data.active_stream,
                epoch: data.loop_epoch,
            }
        };
        self.state_changed.notify_waiters();
        change
    }

    /// Raises start-overlay and resets the other overlay flags.
    pub fn raise_overlay_start(&self) {
        self.lock().overlay = OverlayFlags {
            start: true,
            pause: false,
            finish: false,
        };
        self.overlay_changed.notify_waiters();
    }

    /// Raises pause-overlay and settles the match from the final readings.
    pub fn settle(&self, calibration: &[Calibration; 2]) -> ([u8; 2], Player) {
        let settled = {
            let mut data = self.lock();
            data.overlay.pause = true;
            let scores = [
                calibration[0].weighted_score(data.readings[0]),
                calibration[1].weighted_score(data.readings[1]),
            ];
            let winner = decide_winner(scores);
            data.scores = scores;
            data.winner = Some(winner);
            (scores, winner)
        };
        self.overlay_changed.notify_waiters();
        settled
    }

    /// Raises finish-overlay and drops any start press left over from the
    /// match.
    pub fn raise_overlay_finish(&self) {
        {
            let mut data = self.lock();
            data.overlay.finish = true;
            data.start_requested = false;
        }
        self.overlay_changed.notify_waiters();
    }

    // ------------------------------------------------------------------
    // Overlay renderer
    // ------------------------------------------------------------------

    /// Readings and overlay flags, read together.
    #[must_use]
    pub fn overlay_view(&self) -> ([u8; 2], OverlayFlags) {
        let data = self.lock();
        (data.readings, data.overlay)
    }

    /// Publishes live scores. Ignored once the match has been settled.
    pub fn publish_live_scores(&self, scores: [u8; 2]) -> bool {
        let mut data = self.lock();
        if data.overlay.pause {
            return false;
        }
        data.scores = scores;
        true
    }

    /// Clears start-overlay once the renderer has picked it up.
    pub fn acknowledge_overlay_start(&self) {
        self.lock().overlay.start = false;
        self.overlay_changed.notify_waiters();
    }

    /// Clears pause/finish once the renderer has released its layers.
    pub fn acknowledge_overlay_finish(&self) {
        {
            let mut data = self.lock();
            data.overlay.pause = false;
            data.overlay.finish = false;
        }
        self.overlay_changed.notify_waiters();
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    /// Waits until `ready` holds, re-checking on every state change.
    pub async fn wait_state<F>(&self, ready: F)
    where
        F: FnMut(&MatchData) -> bool + Send,
    {
        self.wait_on(&self.state_changed, ready).await;
    }

    /// Waits until `ready` holds, re-checking on every overlay change.
    pub async fn wait_overlay<F>(&self, ready: F)
    where
        F: FnMut(&MatchData) -> bool + Send,
    {
        self.wait_on(&self.overlay_changed, ready).await;
    }

    /// Waits for the first loop boundary after `epoch`.
    pub async fn wait_loop_boundary(&self, epoch: u64) {
        self.wait_state(|data| data.loop_epoch > epoch).await;
    }

    async fn wait_on<F>(&self, notify: &Notify, mut ready: F)
    where
        F: FnMut(&MatchData) -> bool + Send,
    {
        loop {
            // Register before checking so a notify between the check and
            // the await is not lost.
            let mut notified = pin!(notify.notified());
            notified.as_mut().enable();
            if self.check(&mut ready) {
                return;
            }
            notified.await;
        }
    }

    fn check<F>(&self, ready: &mut F) -> bool
    where
        F: FnMut(&MatchData) -> bool,
    {
        ready(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::schema::CalibrationConfig;

    fn state() -> MatchState {
        MatchState::new(StreamTable::default().idle)
    }

    #[test]
    fn test_boot_state() {
        let data = state().snapshot();
        assert_eq!(data.phase, Phase::Idle);
        assert!(data.allow_start);
        assert!(!data.start_requested);
        assert_eq!(data.active_stream, StreamId(0));
        assert_eq!(data.overlay, OverlayFlags::default());
    }

    #[test]
    fn test_start_accepted_once() {
        let state = state();
        assert!(state.request_start());
        assert!(!state.request_start());
        let data = state.snapshot();
        assert!(data.start_requested);
        assert!(!data.allow_start);
    }

    #[test]
    fn test_start_rejected_leaves_state_unchanged() {
        let state = state();
        state.lock().allow_start = false;
        let before = state.snapshot();
        assert!(!state.request_start());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_readings_last_write_wins() {
        let state = state();
        state.record_reading(Player::Two, 10);
        state.record_reading(Player::Two, 3);
        assert_eq!(state.snapshot().readings, [0, 3]);
    }

    #[test]
    fn test_advance_selects_stream_and_clears_start() {
        let state = state();
        let streams = StreamTable::default();
        state.request_start();
        let change = state.advance(&streams);
        assert_eq!(change.from, Phase::Idle);
        assert_eq!(change.to, Phase::Countdown);
        assert_eq!(change.stream, streams.countdown);
        let data = state.snapshot();
        assert!(!data.start_requested);
        assert!(!data.allow_start);
        assert_eq!(data.active_stream, streams.countdown);
    }

    #[test]
    fn test_allow_start_only_in_idle() {
        let state = state();
        let streams = StreamTable::default();
        state.request_start();
        for expected in [
            Phase::Countdown,
            Phase::Active,
            Phase::Winner(Player::Two),
            Phase::Idle,
        ] {
            let change = state.advance(&streams);
            assert_eq!(change.to, expected);
            assert_eq!(state.snapshot().allow_start, expected == Phase::Idle);
        }
    }

    #[test]
    fn test_settle_uses_final_readings() {
        let state = state();
        state.record_reading(Player::One, 200);
        state.record_reading(Player::Two, 20);
        let (scores, winner) = state.settle(&CalibrationConfig::default().as_array());
        assert!(scores[0] > scores[1]);
        assert_eq!(winner, Player::One);
        let data = state.snapshot();
        assert!(data.overlay.pause);
        assert_eq!(data.scores, scores);
        assert_eq!(data.winner, Some(Player::One));
    }

    #[test]
    fn test_live_scores_ignored_after_settle() {
        let state = state();
        assert!(state.publish_live_scores([50, 60]));
        state.settle(&CalibrationConfig::default().as_array());
        let settled = state.snapshot().scores;
        assert!(!state.publish_live_scores([99, 99]));
        assert_eq!(state.snapshot().scores, settled);
    }

    #[test]
    fn test_finish_clears_start_request() {
        let state = state();
        state.lock().start_requested = true;
        state.raise_overlay_finish();
        let data = state.snapshot();
        assert!(data.overlay.finish);
        assert!(!data.start_requested);
    }

    #[tokio::test]
    async fn test_loop_boundary_wakes_waiter() {
        let state = Arc::new(state());
        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.wait_loop_boundary(0).await })
        };
        tokio::task::yield_now().await;
        state.signal_loop_boundary();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_ready() {
        let state = state();
        state.signal_loop_boundary();
        tokio::time::timeout(Duration::from_secs(1), state.wait_loop_boundary(0))
            .await
            .expect("boundary already passed");
    }

    #[tokio::test]
    async fn test_boundary_from_foreign_thread() {
        let state = Arc::new(state());
        let signaller = Arc::clone(&state);
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            signaller.signal_loop_boundary();
        });
        tokio::time::timeout(Duration::from_secs(5), state.wait_loop_boundary(0))
            .await
            .expect("boundary from another thread");
        thread.join().unwrap();
    }
}

//! Media player integration.
//!
//! The media player owns its own thread and calls back into the controller
//! synchronously: [`PlayerHooks::control_callback`] on every frame to learn
//! which stream to show, and [`PlayerHooks::loop_callback`] each time the
//! playback loop completes. [`LoopClock`] stands in for a real player by
//! making the same calls on a fixed schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::schema::StreamId;
use crate::game::state::MatchState;
use crate::observability::metrics;

/// Kind of elementary stream inside the media container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Video track
    Video,
    /// Audio track
    Audio,
}

/// Stream selection exposed by the media player to its control callback.
pub trait StreamSelector {
    /// Switches the active stream of `kind`.
    fn set_active_stream(&mut self, kind: StreamKind, stream: StreamId);
}

/// Callbacks the media player invokes.
#[derive(Debug)]
pub struct PlayerHooks {
    state: Arc<MatchState>,
    last_applied: Mutex<StreamId>,
    in_loop_callback: AtomicBool,
}

impl PlayerHooks {
    /// Creates hooks for `state`. The player is assumed to start on the
    /// stream currently selected.
    #[must_use]
    pub fn new(state: Arc<MatchState>) -> Self {
        let current = state.active_stream();
        Self {
            state,
            last_applied: Mutex::new(current),
            in_loop_callback: AtomicBool::new(false),
        }
    }

    /// Applies the selected stream to video and audio if it changed since
    /// the last call. Returns `true` when the player should restart
    /// playback.
    pub fn control_callback(&self, selector: &mut dyn StreamSelector) -> bool {
        let wanted = self.state.active_stream();
        let mut last = self
            .last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *last == wanted {
            return false;
        }
        selector.set_active_stream(StreamKind::Video, wanted);
        selector.set_active_stream(StreamKind::Audio, wanted);
        debug!(from = %*last, to = %wanted, "stream switched");
        *last = wanted;
        true
    }

    /// Signals that a playback loop completed. Always asks the player to
    /// continue.
    pub fn loop_callback(&self) -> bool {
        if self.in_loop_callback.swap(true, Ordering::AcqRel) {
            warn!("loop callback re-entered");
        }
        let epoch = self.state.signal_loop_boundary();
        metrics::record_loop_boundary();
        debug!(epoch, "loop boundary");
        self.in_loop_callback.store(false, Ordering::Release);
        true
    }
}

/// Stream selector that only remembers what was selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingSelector {
    /// Active video stream
    pub video: Option<StreamId>,
    /// Active audio stream
    pub audio: Option<StreamId>,
    /// Number of selections made
    pub switches: u64,
}

impl StreamSelector for RecordingSelector {
    fn set_active_stream(&mut self, kind: StreamKind, stream: StreamId) {
        match kind {
            StreamKind::Video => self.video = Some(stream),
            StreamKind::Audio => self.audio = Some(stream),
        }
        self.switches += 1;
    }
}

/// Drives [`PlayerHooks`] from a dedicated OS thread in place of a real
/// media player.
///
/// Every `frame` the control callback runs; a stream switch restarts the
/// loop. When a loop of `period` completes, the loop callback runs.
#[derive(Debug, Clone, Copy)]
pub struct LoopClock {
    /// Length of one playback loop
    pub period: Duration,
    /// Interval between control callbacks
    pub frame: Duration,
}

impl LoopClock {
    /// Creates a clock with the given loop period and a 40 ms frame.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            frame: Duration::from_millis(40),
        }
    }

    /// Starts the clock thread. It runs until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn(
        self,
        hooks: Arc<PlayerHooks>,
        cancel: CancellationToken,
    ) -> std::io::Result<JoinHandle<RecordingSelector>> {
        std::thread::Builder::new()
            .name("loop-clock".to_owned())
            .spawn(move || self.run(&hooks, &cancel))
    }

    fn run(self, hooks: &PlayerHooks, cancel: &CancellationToken) -> RecordingSelector {
        info!(period = ?self.period, "loop clock started");
        let mut selector = RecordingSelector::default();
        let mut loop_started = Instant::now();

        while !cancel.is_cancelled() {
            if hooks.control_callback(&mut selector) {
                loop_started = Instant::now();
            }
            if loop_started.elapsed() >= self.period {
                if !hooks.loop_callback() {
                    break;
                }
                loop_started = Instant::now();
            }
            std::thread::sleep(self.frame);
        }
        debug!(switches = selector.switches, "loop clock stopped");
        selector
    }
}

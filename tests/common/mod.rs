//! Shared integration-test harness: a full controller wired to an in-memory
//! bus, a headless compositor, and directly driven player callbacks.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use strongman::bus::ControlPacket;
use strongman::config::GameConfig;
use strongman::controller::{Controller, ControllerOptions, ControllerReport};
use strongman::error::StrongmanError;
use strongman::game::{MatchState, Phase};
use strongman::observability::EventEmitter;
use strongman::overlay::HeadlessCompositor;
use strongman::player::{PlayerHooks, RecordingSelector};

/// Upper bound for any single wait in a test.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll period for state that changes without a notification.
const READING_POLL: Duration = Duration::from_millis(1);

/// A running controller and the test's end of every interface it touches.
pub struct Rig {
    pub config: Arc<GameConfig>,
    pub state: Arc<MatchState>,
    pub hooks: Arc<PlayerHooks>,
    pub compositor: Arc<HeadlessCompositor>,
    /// What the media player is currently showing.
    pub selector: RecordingSelector,
    bus: DuplexStream,
    cancel: CancellationToken,
    handle: JoinHandle<Result<ControllerReport, StrongmanError>>,
}

impl Rig {
    /// Starts a controller with `config`.
    pub fn start(config: GameConfig) -> Self {
        Self::start_with_events(config, EventEmitter::noop())
    }

    /// Starts a controller that reports events to `events`.
    pub fn start_with_events(config: GameConfig, events: EventEmitter) -> Self {
        let config = Arc::new(config);
        let compositor = Arc::new(HeadlessCompositor::new());
        let controller = Controller::new(ControllerOptions {
            config: Arc::clone(&config),
            compositor: Arc::clone(&compositor),
            events: Arc::new(events),
            bus_label: "duplex".to_string(),
            bus_stops_at_eof: true,
        });
        let state = controller.state();
        let hooks = controller.hooks();

        let (bus, controller_end) = tokio::io::duplex(256);
        let (bus_in, bus_out) = tokio::io::split(controller_end);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { controller.run(bus_in, bus_out, cancel).await }
        });

        Self {
            config,
            state,
            hooks,
            compositor,
            selector: RecordingSelector::default(),
            bus,
            cancel,
            handle,
        }
    }

    /// Writes raw bytes onto the sensor bus.
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.bus.write_all(bytes).await.unwrap();
    }

    /// Writes one framed packet onto the sensor bus.
    pub async fn send(&mut self, instruction: u8, value: u8) {
        let bytes = ControlPacket::new(instruction, value).to_bytes();
        self.send_bytes(&bytes).await;
    }

    /// Reads the next three bytes the controller wrote to the bus.
    pub async fn read_packet(&mut self) -> [u8; 3] {
        let mut buf = [0u8; 3];
        tokio::time::timeout(DEFAULT_TIMEOUT, self.bus.read_exact(&mut buf))
            .await
            .expect("timed out waiting for bus output")
            .unwrap();
        buf
    }

    /// Plays one frame and then completes a loop, the way the media player
    /// calls back.
    pub fn complete_loop(&mut self) {
        self.hooks.control_callback(&mut self.selector);
        assert!(self.hooks.loop_callback());
        self.hooks.control_callback(&mut self.selector);
    }

    /// Waits until the engine enters `phase`.
    pub async fn wait_phase(&self, phase: Phase) {
        tokio::time::timeout(DEFAULT_TIMEOUT, self.state.wait_state(|d| d.phase == phase))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {phase}"));
    }

    /// Waits until the start press has been recorded.
    pub async fn wait_start_requested(&self) {
        tokio::time::timeout(DEFAULT_TIMEOUT, self.state.wait_state(|d| d.start_requested))
            .await
            .expect("timed out waiting for start request");
    }

    /// Polls until the stored sensor readings satisfy `pred`.
    ///
    /// Readings are written without a wake-up, so this checks on a short
    /// period instead of waiting on the state condition.
    pub async fn wait_readings(&self, pred: impl Fn([u8; 2]) -> bool) {
        tokio::time::timeout(DEFAULT_TIMEOUT, async {
            while !pred(self.state.snapshot().readings) {
                tokio::time::sleep(READING_POLL).await;
            }
        })
        .await
        .expect("timed out waiting for sensor readings");
    }

    /// Stops the controller and returns its report.
    pub async fn stop(self) -> ControllerReport {
        self.cancel.cancel();
        self.handle.await.unwrap().unwrap()
    }
}

/// Runs the `strongman` binary to completion.
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_strongman"))
        .args(args)
        .env_remove("STRONGMAN_CONFIG")
        .env_remove("STRONGMAN_BUS")
        .output()
        .expect("failed to run strongman")
}

/// Writes `contents` to `name` inside `dir`.
pub fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

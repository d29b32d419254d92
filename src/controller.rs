//! Controller runtime wiring the bus, match logic, and overlay together.
//!
//! The [`Controller`] owns the shared [`MatchState`] and spawns one task per
//! concurrent unit: bus reader, packet processor, match engine, overlay
//! renderer, and bus writer. The media player talks to the same state
//! through [`PlayerHooks`] from its own thread.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::{BusReader, BusWriter, ReaderStats, lamp_channel, packet_queue};
use crate::config::schema::GameConfig;
use crate::error::StrongmanError;
use crate::game::engine::MatchEngine;
use crate::game::processor::PacketProcessor;
use crate::game::state::MatchState;
use crate::observability::events::{Event, EventEmitter};
use crate::overlay::compositor::Compositor;
use crate::overlay::renderer::OverlayRenderer;
use crate::player::PlayerHooks;

/// How long the bus writer may take to drain after the engine stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Options for constructing a [`Controller`].
pub struct ControllerOptions<C: ?Sized> {
    /// Validated game configuration.
    pub config: Arc<GameConfig>,
    /// Compositor the overlay draws through.
    pub compositor: Arc<C>,
    /// Event emitter for structured events.
    pub events: Arc<EventEmitter>,
    /// Human-readable bus source, reported in events.
    pub bus_label: String,
    /// Stop reading the bus at end of stream instead of retrying.
    pub bus_stops_at_eof: bool,
}

/// Counters reported when the controller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerReport {
    /// Bus reader counters
    pub reader: ReaderStats,
    /// Packets applied by the processor
    pub packets_processed: u64,
}

/// Game controller runtime.
pub struct Controller<C: ?Sized> {
    config: Arc<GameConfig>,
    state: Arc<MatchState>,
    hooks: Arc<PlayerHooks>,
    compositor: Arc<C>,
    events: Arc<EventEmitter>,
    bus_label: String,
    bus_stops_at_eof: bool,
}

impl<C> Controller<C>
where
    C: Compositor + ?Sized + 'static,
{
    /// Creates a controller in the idle phase.
    #[must_use]
    pub fn new(opts: ControllerOptions<C>) -> Self {
        let state = Arc::new(MatchState::new(opts.config.streams.idle));
        let hooks = Arc::new(PlayerHooks::new(Arc::clone(&state)));
        Self {
            config: opts.config,
            state,
            hooks,
            compositor: opts.compositor,
            events: opts.events,
            bus_label: opts.bus_label,
            bus_stops_at_eof: opts.bus_stops_at_eof,
        }
    }

    /// Shared match state.
    #[must_use]
    pub fn state(&self) -> Arc<MatchState> {
        Arc::clone(&self.state)
    }

    /// Callbacks to hand to the media player.
    #[must_use]
    pub fn hooks(&self) -> Arc<PlayerHooks> {
        Arc::clone(&self.hooks)
    }

    /// Runs every controller task until `cancel` fires or the overlay fails.
    ///
    /// # Errors
    ///
    /// Returns [`StrongmanError::Render`] if the overlay renderer fails, or
    /// [`StrongmanError::Task`] if a task panicked. Either way the other
    /// tasks are stopped first.
    pub async fn run<R, W>(
        &self,
        bus_in: R,
        bus_out: W,
        cancel: CancellationToken,
    ) -> Result<ControllerReport, StrongmanError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.events.emit(Event::ControllerStarted {
            timestamp: Utc::now(),
            bus: self.bus_label.clone(),
        });
        info!(bus = %self.bus_label, phase = %self.state.phase(), "controller started");

        let tasks = cancel.child_token();
        let result = self.supervise(bus_in, bus_out, &tasks).await;

        self.events.emit(Event::ControllerStopped {
            timestamp: Utc::now(),
            reason: match &result {
                Ok(_) => "cancelled".to_string(),
                Err(e) => format!("error: {e}"),
            },
        });
        match &result {
            Ok(report) => info!(
                packets = report.packets_processed,
                bus_errors = report.reader.read_errors,
                dropped_frames = report.reader.dropped_frames,
                "controller stopped"
            ),
            Err(e) => error!(error = %e, "controller stopped"),
        }
        result
    }

    async fn supervise<R, W>(
        &self,
        bus_in: R,
        bus_out: W,
        tasks: &CancellationToken,
    ) -> Result<ControllerReport, StrongmanError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (packet_tx, packet_rx) = packet_queue();
        let (lamps, lamp_rx) = lamp_channel();

        let reader = tokio::spawn(
            BusReader::new(bus_in, packet_tx, self.config.timing.bus_retry_delay)
                .stop_at_eof(self.bus_stops_at_eof)
                .run(tasks.clone()),
        );
        let processor = tokio::spawn(
            PacketProcessor::new(
                Arc::clone(&self.state),
                packet_rx,
                Arc::clone(&self.events),
            )
            .run(tasks.clone()),
        );
        let engine = tokio::spawn(
            MatchEngine::new(
                Arc::clone(&self.state),
                Arc::clone(&self.config),
                lamps,
                Arc::clone(&self.events),
            )
            .run(tasks.clone()),
        );
        let renderer = tokio::spawn(
            OverlayRenderer::new(
                Arc::clone(&self.state),
                Arc::clone(&self.compositor),
                &self.config,
            )
            .run(tasks.clone()),
        );
        // The writer outlives the engine so a final lamp-off still goes out.
        let writer_cancel = CancellationToken::new();
        let writer = tokio::spawn(BusWriter::new(bus_out, lamp_rx).run(writer_cancel.clone()));

        // The renderer only returns on cancellation or a fatal error.
        let rendered = renderer.await;
        tasks.cancel();

        let engine_done = engine.await;
        drain_writer(writer, &writer_cancel).await;
        let reader_stats = reader.await;
        let processed = processor.await;

        rendered??;
        engine_done?;
        Ok(ControllerReport {
            reader: reader_stats?,
            packets_processed: processed?,
        })
    }
}

async fn drain_writer(writer: JoinHandle<()>, writer_cancel: &CancellationToken) {
    let abort = writer.abort_handle();
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "bus writer task failed"),
        Err(_) => {
            warn!("bus writer did not drain in time");
            writer_cancel.cancel();
            abort.abort();
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for Controller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("bus", &self.bus_label)
            .field("phase", &self.state.phase())
            .finish_non_exhaustive()
    }
}

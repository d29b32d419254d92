//! Packet processor task.
//!
//! Drains the packet queue in arrival order and applies each packet to the
//! shared match state. Packets of unknown kind never touch the state.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::phase::Player;
use super::state::MatchState;
use crate::bus::{ControlPacket, PacketKind, PacketReceiver};
use crate::observability::{Event, EventEmitter, metrics};

/// What a single packet did to the match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Start press accepted; a match will begin
    StartAccepted,
    /// Start press while starting was not allowed
    StartIgnored,
    /// Strength reading stored
    Reading {
        /// Player whose sensor reported
        player: Player,
        /// Raw reading
        value: u8,
    },
    /// Packet had no effect
    Ignored,
}

/// Consumes the packet queue.
pub struct PacketProcessor {
    state: Arc<MatchState>,
    queue: PacketReceiver,
    events: Arc<EventEmitter>,
}

impl PacketProcessor {
    /// Creates a processor applying packets from `queue` to `state`.
    #[must_use]
    pub fn new(state: Arc<MatchState>, queue: PacketReceiver, events: Arc<EventEmitter>) -> Self {
        Self {
            state,
            queue,
            events,
        }
    }

    /// Processes packets until the queue closes or `cancel` fires.
    ///
    /// Returns the number of packets processed.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        let mut processed = 0u64;
        loop {
            let packet = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("packet processor cancelled");
                    break;
                }
                packet = self.queue.recv() => packet,
            };
            let Some(packet) = packet else {
                debug!("packet queue closed");
                break;
            };
            self.apply(packet);
            processed += 1;
        }
        processed
    }

    /// Applies one packet.
    pub fn apply(&self, packet: ControlPacket) -> PacketOutcome {
        let kind = packet.kind();
        metrics::record_packet(kind.label());

        match kind {
            kind if kind.is_start_press() => {
                let accepted = self.state.request_start();
                metrics::record_start_request(accepted);
                if accepted {
                    info!("start requested");
                    self.events.emit(Event::StartRequested {
                        timestamp: Utc::now(),
                    });
                    PacketOutcome::StartAccepted
                } else {
                    debug!("start press ignored, match in progress");
                    PacketOutcome::StartIgnored
                }
            }
            PacketKind::Analogue { player, reading } => {
                let player = Player::from_index(player);
                self.state.record_reading(player, reading);
                trace!(%player, reading, "strength reading");
                PacketOutcome::Reading {
                    player,
                    value: reading,
                }
            }
            PacketKind::Digital { .. } | PacketKind::Unknown { .. } => {
                trace!(
                    instruction = packet.instruction,
                    value = packet.value,
                    "packet ignored"
                );
                PacketOutcome::Ignored
            }
        }
    }
}

impl std::fmt::Debug for PacketProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketProcessor").finish_non_exhaustive()
    }
}

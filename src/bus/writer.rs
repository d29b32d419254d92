//! Outbound side of the sensor bus: winner lamps.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::PacketCodec;
use super::packet::ControlPacket;
use crate::error::BusError;

/// Handle used by the match engine to queue outbound packets.
#[derive(Debug, Clone)]
pub struct LampSender {
    tx: mpsc::UnboundedSender<ControlPacket>,
}

impl LampSender {
    /// Queues a winner-lamp change for `player` (0-based).
    ///
    /// # Errors
    ///
    /// Returns [`BusError::WriterClosed`] if the writer task has stopped.
    pub fn set_lamp(&self, player: usize, on: bool) -> Result<(), BusError> {
        self.send(ControlPacket::lamp(player, on))
    }

    /// Queues an arbitrary packet.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::WriterClosed`] if the writer task has stopped.
    pub fn send(&self, packet: ControlPacket) -> Result<(), BusError> {
        self.tx.send(packet).map_err(|_| BusError::WriterClosed)
    }
}

/// Creates a connected lamp sender and outbound receiver.
#[must_use]
pub fn lamp_channel() -> (LampSender, mpsc::UnboundedReceiver<ControlPacket>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LampSender { tx }, rx)
}

/// Owns the bus write half and writes queued packets in order.
pub struct BusWriter<W> {
    sink: FramedWrite<W, PacketCodec>,
    outbound: mpsc::UnboundedReceiver<ControlPacket>,
}

impl<W> BusWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a writer draining `outbound` onto `writer`.
    #[must_use]
    pub fn new(writer: W, outbound: mpsc::UnboundedReceiver<ControlPacket>) -> Self {
        Self {
            sink: FramedWrite::new(writer, PacketCodec::new()),
            outbound,
        }
    }

    /// Writes packets until every sender is dropped or `cancel` fires.
    ///
    /// Write failures are logged and the packet is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let packet = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("bus writer cancelled");
                    break;
                }
                packet = self.outbound.recv() => packet,
            };
            let Some(packet) = packet else {
                debug!("all lamp senders dropped, stopping bus writer");
                break;
            };

            if let Err(e) = self.sink.send(packet).await {
                warn!(
                    error = %e,
                    instruction = packet.instruction,
                    value = packet.value,
                    "bus write failed"
                );
            }
        }
    }
}

impl<W> std::fmt::Debug for BusWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusWriter").finish_non_exhaustive()
    }
}

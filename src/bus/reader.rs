//! Inbound side of the sensor bus: the framer task.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::PacketSender;
use super::codec::PacketCodec;
use crate::observability::metrics;

/// Read buffer size. Packets are three bytes, so this is generous.
const READ_CHUNK: usize = 64;

/// Counters reported by a finished [`BusReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Raw bytes read from the bus
    pub bytes: u64,
    /// Complete packets handed to the queue
    pub packets: u64,
    /// Read calls that failed and were retried
    pub read_errors: u64,
    /// Reads that returned no bytes and were retried
    pub empty_reads: u64,
    /// Partial frames abandoned on an early header byte
    pub dropped_frames: u64,
}

/// Reads raw bytes from the bus, frames them, and enqueues packets in
/// arrival order.
pub struct BusReader<R> {
    reader: R,
    codec: PacketCodec,
    buffer: BytesMut,
    queue: PacketSender,
    retry_delay: Duration,
    stop_at_eof: bool,
    stats: ReaderStats,
}

impl<R> BusReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a reader feeding `queue`.
    ///
    /// `retry_delay` is the pause after a failed or empty read before the
    /// next attempt.
    #[must_use]
    pub fn new(reader: R, queue: PacketSender, retry_delay: Duration) -> Self {
        Self {
            reader,
            codec: PacketCodec::new(),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            queue,
            retry_delay,
            stop_at_eof: false,
            stats: ReaderStats::default(),
        }
    }

    /// Treat a zero-length read as end of stream and stop.
    ///
    /// Off by default: a serial line in non-blocking mode returns empty reads
    /// whenever it is idle. Finite sources such as pipes and files opt in.
    #[must_use]
    pub const fn stop_at_eof(mut self, stop: bool) -> Self {
        self.stop_at_eof = stop;
        self
    }

    /// Runs until `cancel` fires or the queue consumer goes away, or at end
    /// of stream when [`stop_at_eof`](Self::stop_at_eof) is set.
    ///
    /// Read errors and empty reads are retried after the retry delay; they
    /// never end the loop.
    pub async fn run(mut self, cancel: CancellationToken) -> ReaderStats {
        loop {
            self.buffer.reserve(READ_CHUNK);
            let read = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("bus reader cancelled");
                    break;
                }
                read = self.reader.read_buf(&mut self.buffer) => read,
            };

            match read {
                Ok(0) if !self.stop_at_eof => {
                    self.stats.empty_reads += 1;
                    trace!("empty bus read, retrying");
                    if !back_off(self.retry_delay, &cancel).await {
                        break;
                    }
                }
                Ok(0) => {
                    info!(
                        bytes = self.stats.bytes,
                        packets = self.stats.packets,
                        "bus reached end of stream"
                    );
                    break;
                }
                Ok(n) => {
                    self.stats.bytes += n as u64;
                    trace!(n, "bus bytes received");
                    if !self.drain_packets() {
                        debug!("packet queue closed, stopping bus reader");
                        break;
                    }
                }
                Err(e) => {
                    self.stats.read_errors += 1;
                    metrics::record_bus_read_error();
                    warn!(error = %e, "bus read failed, retrying");
                    if !back_off(self.retry_delay, &cancel).await {
                        break;
                    }
                }
            }
        }
        self.stats
    }

    /// Frames everything buffered so far. Returns `false` once the queue
    /// has no consumer.
    fn drain_packets(&mut self) -> bool {
        let mut open = true;
        // PacketCodec::decode is infallible; an Err here would be a codec bug.
        while let Ok(Some(packet)) = self.codec.decode(&mut self.buffer) {
            trace!(
                instruction = packet.instruction,
                value = packet.value,
                "packet framed"
            );
            if self.queue.send(packet).is_err() {
                open = false;
                break;
            }
            self.stats.packets += 1;
        }

        let dropped = self.codec.framer().dropped_frames();
        if dropped > self.stats.dropped_frames {
            let fresh = dropped - self.stats.dropped_frames;
            debug!(fresh, total = dropped, "partial bus frames abandoned");
            metrics::record_dropped_frames(fresh);
            self.stats.dropped_frames = dropped;
        }
        open
    }
}

/// Waits out `delay`. Returns `false` if cancelled meanwhile.
async fn back_off(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

impl<R> std::fmt::Debug for BusReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusReader")
            .field("stats", &self.stats)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

//! Sensor bus plumbing.
//!
//! Inbound bytes are framed by [`BusReader`] and queued for the packet
//! processor; outbound winner-lamp packets are written by [`BusWriter`].
//! Both speak the same three-byte `[0xFF][instruction][value]` format via
//! [`PacketCodec`].

pub mod codec;
pub mod packet;
pub mod reader;
pub mod writer;

pub use codec::{PacketCodec, PacketFramer};
pub use packet::{ControlPacket, PACKET_HEADER, PACKET_SIZE, PacketKind};
pub use reader::{BusReader, ReaderStats};
pub use writer::{BusWriter, LampSender, lamp_channel};

use tokio::sync::mpsc;

/// Producer half of the packet queue (held by the framer).
pub type PacketSender = mpsc::UnboundedSender<ControlPacket>;

/// Consumer half of the packet queue (held by the processor).
pub type PacketReceiver = mpsc::UnboundedReceiver<ControlPacket>;

/// Creates the FIFO queue between the framer and the packet processor.
#[must_use]
pub fn packet_queue() -> (PacketSender, PacketReceiver) {
    mpsc::unbounded_channel()
}

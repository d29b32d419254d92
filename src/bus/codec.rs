//! Byte-level framing for the sensor bus.
//!
//! [`PacketFramer`] is a byte-at-a-time state machine: a header byte always
//! restarts framing, the next two bytes form the packet, and anything after
//! that is discarded until the next header. There is no escaping and no
//! checksum, so a `0xFF` instruction or value byte silently restarts the
//! frame.
//!
//! [`PacketCodec`] wraps the framer in the `tokio_util` codec traits so the
//! same type reads inbound packets and writes outbound ones.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::packet::{ControlPacket, PACKET_HEADER, PACKET_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FrameState {
    /// Waiting for a header byte; everything else is dropped
    #[default]
    Unsynced,
    /// Header seen, next byte is the instruction
    Instruction,
    /// Instruction seen, next byte completes the packet
    Value(u8),
}

/// Incremental packet framer.
#[derive(Debug, Clone, Default)]
pub struct PacketFramer {
    state: FrameState,
    dropped: u64,
}

impl PacketFramer {
    /// Creates a framer that has not yet seen a header byte.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte, returning a packet when this byte completes one.
    pub fn push(&mut self, byte: u8) -> Option<ControlPacket> {
        if byte == PACKET_HEADER {
            if self.state != FrameState::Unsynced {
                self.dropped += 1;
            }
            self.state = FrameState::Instruction;
            return None;
        }

        match self.state {
            FrameState::Unsynced => None,
            FrameState::Instruction => {
                self.state = FrameState::Value(byte);
                None
            }
            FrameState::Value(instruction) => {
                self.state = FrameState::Unsynced;
                Some(ControlPacket::new(instruction, byte))
            }
        }
    }

    /// Feeds a slice, collecting every completed packet in arrival order.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<ControlPacket> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Number of partial frames abandoned because a header byte arrived early.
    #[must_use]
    pub const fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}

/// `tokio_util` codec for [`ControlPacket`]s.
#[derive(Debug, Clone, Default)]
pub struct PacketCodec {
    framer: PacketFramer,
}

impl PacketCodec {
    /// Creates a codec with a fresh framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The framer backing this codec.
    #[must_use]
    pub const fn framer(&self) -> &PacketFramer {
        &self.framer
    }
}

impl Decoder for PacketCodec {
    type Item = ControlPacket;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            if let Some(packet) = self.framer.push(src.get_u8()) {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A truncated trailing frame is dropped, never reported.
        self.decode(buf)
    }
}

impl Encoder<ControlPacket> for PacketCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: ControlPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(PACKET_SIZE);
        dst.put_slice(&item.to_bytes());
        Ok(())
    }
}

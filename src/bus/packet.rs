//! Control packet types carried on the sensor bus.
//!
//! Every packet is `[0xFF][instruction][value]`. The high nibble of the
//! instruction selects the packet kind, the low nibble addresses a channel.

/// Header byte that starts (and resynchronizes) every packet.
pub const PACKET_HEADER: u8 = 0xFF;

/// Size of a complete packet on the wire, header included.
pub const PACKET_SIZE: usize = 3;

/// Instruction for the player-1 winner lamp.
pub const LAMP_PLAYER1: u8 = 0x11;

/// Instruction for the player-2 winner lamp.
pub const LAMP_PLAYER2: u8 = 0x12;

/// One framed `(instruction, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlPacket {
    /// Instruction byte (kind in the high nibble, channel in the low nibble)
    pub instruction: u8,
    /// Payload byte
    pub value: u8,
}

impl ControlPacket {
    /// Creates a packet from its two payload bytes.
    #[must_use]
    pub const fn new(instruction: u8, value: u8) -> Self {
        Self { instruction, value }
    }

    /// Packet turning a winner lamp on or off.
    ///
    /// `player` is 0-based; anything other than 0 addresses the player-2 lamp.
    #[must_use]
    pub const fn lamp(player: usize, on: bool) -> Self {
        let instruction = if player == 0 { LAMP_PLAYER1 } else { LAMP_PLAYER2 };
        Self::new(instruction, on as u8)
    }

    /// Classifies the packet by the high nibble of its instruction.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        let channel = self.instruction & 0x0F;
        match self.instruction >> 4 {
            0x1 => PacketKind::Digital {
                channel,
                pressed: self.value == 1,
            },
            0x2 => PacketKind::Analogue {
                player: (self.instruction & 1) as usize,
                reading: self.value,
            },
            nibble => PacketKind::Unknown { nibble },
        }
    }

    /// Wire representation including the header byte.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        [PACKET_HEADER, self.instruction, self.value]
    }
}

/// Decoded meaning of a [`ControlPacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Button input. Channel 0 is the start button.
    Digital {
        /// Low nibble of the instruction
        channel: u8,
        /// `true` when the value byte is exactly 1
        pressed: bool,
    },
    /// Strength sensor sample. Bit 0 of the instruction selects the player.
    Analogue {
        /// 0-based player index
        player: usize,
        /// Raw sensor reading
        reading: u8,
    },
    /// Any other instruction family; ignored.
    Unknown {
        /// High nibble of the instruction
        nibble: u8,
    },
}

impl PacketKind {
    /// Short label used for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Digital { .. } => "digital",
            Self::Analogue { .. } => "analogue",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Whether this is a start-button press.
    #[must_use]
    pub const fn is_start_press(&self) -> bool {
        matches!(
            self,
            Self::Digital {
                channel: 0,
                pressed: true
            }
        )
    }
}

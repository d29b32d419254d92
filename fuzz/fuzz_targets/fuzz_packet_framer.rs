#![no_main]

use libfuzzer_sys::fuzz_target;
use strongman::bus::{PACKET_HEADER, PacketFramer};

fuzz_target!(|data: &[u8]| {
    let mut framer = PacketFramer::new();
    let packets = framer.push_slice(data);

    // Each header opens at most one frame, which completes or is abandoned.
    let headers = data.iter().filter(|&&b| b == PACKET_HEADER).count() as u64;
    assert!(packets.len() as u64 + framer.dropped_frames() <= headers);

    // A header byte can never be carried inside a packet.
    assert!(packets.len() <= data.len() / 3);
    for packet in packets {
        assert_ne!(packet.instruction, PACKET_HEADER);
        assert_ne!(packet.value, PACKET_HEADER);
    }
});

//! Match logic: phases, shared state, the packet processor, and the engine.

pub mod engine;
pub mod phase;
pub mod processor;
pub mod state;

pub use engine::MatchEngine;
pub use phase::{Phase, Player, Transition, decide_winner, next_phase};
pub use processor::{PacketOutcome, PacketProcessor};
pub use state::{MatchData, MatchState, OverlayFlags, PhaseChange};

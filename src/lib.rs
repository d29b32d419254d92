//! `strongman` - two-player strength game controller
//!
//! Reads player inputs from a serial sensor bus, sequences matches through
//! their phases in lockstep with a looping media player, and draws each
//! player's power bar on an overlay.

pub mod bus;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod game;
pub mod observability;
pub mod overlay;
pub mod player;

//! The match simulator and its bot/persistence companions.

pub mod bots;
pub mod harness;
pub mod persist;

pub use bots::Agent;
pub use harness::{
    MatchSetup, MatchSim, MoveOptions, MoveResult, PlayerSpec, MAX_CONSECUTIVE_BOT_MOVES,
};
pub use persist::{Snapshot, Store, STORE_VERSION};

//! Core engine types: users, match metadata, RNG.
//!
//! This module contains the fundamental building blocks that are
//! game-agnostic. Games never mutate these directly; they flow through the
//! execution engine and turn controller.

pub mod meta;
pub mod rng;
pub mod user;

pub use meta::{MatchStatus, Meta, Ms, PlayerMeta};
pub use rng::{RandomExt, RandomSource, ScriptedRandom, SeededRandom, SeededRandomState};
pub use user::UserId;

//! # turnkit
//!
//! A deterministic turn-based multiplayer game engine: games declare their
//! rules as typed moves over shared/private/secret boards, and the engine
//! applies each move transactionally, emits minimal state patches for
//! distribution, and collects side effects (turn changes, delayed moves,
//! stats, match end) for the host to apply.
//!
//! ## Design Principles
//!
//! 1. **Same semantics everywhere**: a move executes identically under a
//!    live backend, the in-process simulator, or a test - determinism only
//!    depends on the inputs and the random stream.
//!
//! 2. **Transactional moves**: handlers mutate a draft; a failed handler
//!    leaves no observable change. Patches are derived by structural diff,
//!    never hand-written by game code.
//!
//! 3. **Effects are data**: handlers request turn changes, delayed moves,
//!    and stats through a per-call accumulator; the engine returns it and
//!    the host applies it. No globals, no ambient callbacks.
//!
//! 4. **Typed move registry**: moves are closed enums resolved at the host
//!    boundary, not string-dispatched handler tables.
//!
//! ## Modules
//!
//! - `core`: user ids, match metadata and turn flags, pluggable RNG
//! - `game`: the `Game` trait, configuration, normalization
//! - `engine`: transactional move execution and the effect accumulator
//! - `patch`: structural diff/apply over the board roots
//! - `schedule`: the time-ordered delayed-move queue
//! - `turns`: applying turn effects to metadata and scheduler
//! - `sim`: the match simulator (test harness / local backend)
//! - `games`: example games

pub mod core;
pub mod engine;
pub mod error;
pub mod game;
pub mod games;
pub mod patch;
pub mod schedule;
pub mod sim;
pub mod turns;

// Re-export commonly used types
pub use crate::core::{
    MatchStatus, Meta, Ms, PlayerMeta, RandomExt, RandomSource, ScriptedRandom, SeededRandom,
    SeededRandomState, UserId,
};

pub use crate::error::EngineError;

pub use crate::game::{
    Boards, BotChoice, BotView, Game, GameConfig, InitialBoards, NormalizedGame, NowVerdict,
    SettingDef, SettingOption, SetupContext,
};

pub use crate::engine::{
    BeginTurn, CanDoContext, DelayedRequest, Effects, Engine, ExecMode, ExecuteOptions,
    ExpirationMove, MoveContext, MoveOutput, NowContext, StatRecord, TurnOptions, TurnTargets,
};

pub use crate::patch::{Patch, PatchOp, PatchRoot, PathSeg};

pub use crate::schedule::{Scheduled, ScheduledAction, ScheduleSource, Scheduler};

pub use crate::sim::{
    Agent, MatchSetup, MatchSim, MoveOptions, MoveResult, PlayerSpec, Snapshot, Store,
    STORE_VERSION,
};

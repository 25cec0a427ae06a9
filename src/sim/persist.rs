//! Persisted match snapshots for a local/dev host.
//!
//! The layout is schema-versioned. A version mismatch on load is a hard
//! failure - there is no migration path; the host discards the store and
//! reinitializes the match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{MatchStatus, Meta, Ms, SeededRandomState, UserId};
use crate::game::Game;
use crate::schedule::Scheduled;

/// Current snapshot schema version.
pub const STORE_VERSION: u32 = 3;

/// Everything needed to resume a match exactly where it stopped, including
/// the RNG checkpoint and the virtual clock.
#[derive(Serialize, Deserialize)]
#[serde(bound = "G: Game")]
pub struct Store<G: Game> {
    pub board: G::Board,
    pub playerboards: BTreeMap<UserId, G::Playerboard>,
    pub secretboard: Option<G::Secretboard>,
    pub meta: Meta,
    pub match_status: MatchStatus,
    pub match_stats: BTreeMap<String, i64>,
    pub player_stats: BTreeMap<UserId, BTreeMap<String, i64>>,
    pub delayed_moves: Vec<Scheduled<G::PlayerMove, G::BoardMove>>,
    pub clock: Ms,
    pub random: SeededRandomState,
}

/// A versioned store.
#[derive(Serialize, Deserialize)]
#[serde(bound = "G: Game")]
pub struct Snapshot<G: Game> {
    pub version: u32,
    pub store: Store<G>,
}

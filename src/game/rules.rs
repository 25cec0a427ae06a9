//! The `Game` trait: how a game plugs its rules into the engine.
//!
//! A game is a set of closed sum types (boards and moves) plus handlers.
//! Moves are enum variants, not string-dispatched handlers - the variant is
//! the move name, its fields are the payload, and the compiler checks
//! exhaustiveness. String addressing (used by hosts and bots speaking JSON)
//! goes through [`Game::decode_player_move`] at the boundary.
//!
//! ## Handler phases for a player move
//!
//! 1. `can_do` - pure legality predicate, no mutation
//! 2. `execute_now` - optimistic phase: board + playerboards only, no
//!    randomness, no side effects; safe to mirror on a client before the
//!    server confirms. Returning [`NowVerdict::Cancel`] skips phase 3 but
//!    keeps the patches this phase produced.
//! 3. `execute` - authoritative phase: full state, randomness, side-effect
//!    callbacks.
//!
//! Board moves only have the `execute` phase.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::core::{Ms, RandomSource, UserId};
use crate::engine::{CanDoContext, MoveContext, NowContext};
use crate::error::EngineError;

use super::config::GameConfig;

/// Bounds every board root must satisfy: cloneable for the transactional
/// draft, comparable for cheap no-change detection, serializable for
/// structural diffing and persistence.
pub trait BoardValue: Clone + PartialEq + Debug + Serialize + DeserializeOwned + 'static {}

impl<T: Clone + PartialEq + Debug + Serialize + DeserializeOwned + 'static> BoardValue for T {}

/// Bounds every move type must satisfy: moves travel through the scheduler
/// and the persisted snapshot.
pub trait MoveValue: Clone + PartialEq + Debug + Serialize + DeserializeOwned + 'static {}

impl<T: Clone + PartialEq + Debug + Serialize + DeserializeOwned + 'static> MoveValue for T {}

/// Outcome of the `execute_now` phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NowVerdict {
    /// Continue to the authoritative `execute` phase.
    Proceed,
    /// Short-circuit: keep this phase's patches, skip `execute`.
    Cancel,
}

/// The three state roots of a running match.
pub struct Boards<G: Game> {
    /// Shared state, visible to all participants.
    pub board: G::Board,

    /// Private per-user state. Absent users simply have no entry.
    pub playerboards: BTreeMap<UserId, G::Playerboard>,

    /// State hidden from every player.
    pub secretboard: Option<G::Secretboard>,
}

impl<G: Game> Boards<G> {
    /// Bundle a board with no private or secret state.
    #[must_use]
    pub fn new(board: G::Board) -> Self {
        Self {
            board,
            playerboards: BTreeMap::new(),
            secretboard: None,
        }
    }

    /// A user's playerboard, if they have one.
    #[must_use]
    pub fn playerboard(&self, user: &UserId) -> Option<&G::Playerboard> {
        self.playerboards.get(user)
    }
}

impl<G: Game> Clone for Boards<G> {
    fn clone(&self) -> Self {
        Self {
            board: self.board.clone(),
            playerboards: self.playerboards.clone(),
            secretboard: self.secretboard.clone(),
        }
    }
}

impl<G: Game> Debug for Boards<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boards")
            .field("board", &self.board)
            .field("playerboards", &self.playerboards)
            .field("secretboard", &self.secretboard)
            .finish()
    }
}

impl<G: Game> PartialEq for Boards<G> {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
            && self.playerboards == other.playerboards
            && self.secretboard == other.secretboard
    }
}

/// What `initial_boards` hands back to the harness.
///
/// Playerboards may be returned wholesale here, or omitted and produced
/// per-user by [`Game::initial_playerboard`].
pub struct InitialBoards<G: Game> {
    pub board: G::Board,
    pub playerboards: Option<BTreeMap<UserId, G::Playerboard>>,
    pub secretboard: Option<G::Secretboard>,
}

impl<G: Game> std::fmt::Debug for InitialBoards<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitialBoards")
            .field("board", &self.board)
            .field("playerboards", &self.playerboards)
            .field("secretboard", &self.secretboard)
            .finish()
    }
}

impl<G: Game> InitialBoards<G> {
    /// Start from just a shared board.
    #[must_use]
    pub fn new(board: G::Board) -> Self {
        Self {
            board,
            playerboards: None,
            secretboard: None,
        }
    }

    /// Provide all playerboards up front.
    #[must_use]
    pub fn with_playerboards(mut self, playerboards: BTreeMap<UserId, G::Playerboard>) -> Self {
        self.playerboards = Some(playerboards);
        self
    }

    /// Provide a secretboard.
    #[must_use]
    pub fn with_secretboard(mut self, secretboard: G::Secretboard) -> Self {
        self.secretboard = Some(secretboard);
        self
    }
}

/// Context handed to `initial_boards` at match creation.
#[derive(Clone, Debug)]
pub struct SetupContext {
    /// Registered users in registration order (bots included).
    pub users: Vec<UserId>,

    /// Resolved match-level settings.
    pub settings: BTreeMap<String, String>,

    /// Resolved per-player settings.
    pub player_settings: BTreeMap<UserId, BTreeMap<String, String>>,
}

/// What a bot sees when asked for a move.
pub struct BotView<'a, G: Game> {
    /// The bot's own user id.
    pub user_id: &'a UserId,

    /// Shared board.
    pub board: &'a G::Board,

    /// The bot's own playerboard, if any.
    pub playerboard: Option<&'a G::Playerboard>,

    /// Current match time.
    pub now: Ms,
}

/// A bot's chosen move plus optional telemetry.
#[derive(Clone, Debug, PartialEq)]
pub struct BotChoice<PM> {
    /// The move to apply.
    pub mv: PM,

    /// Opaque decision info (search stats, policy weights) for training use.
    pub info: Option<Value>,

    /// How long the decision took, if the agent measured it.
    pub duration: Option<Ms>,
}

impl<PM> BotChoice<PM> {
    /// A bare move with no telemetry.
    #[must_use]
    pub fn new(mv: PM) -> Self {
        Self {
            mv,
            info: None,
            duration: None,
        }
    }

    /// Attach decision info.
    #[must_use]
    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    /// Attach a decision duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Ms) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A complete game definition.
///
/// Every handler has a default so games only implement the phases they use;
/// an unimplemented `execute` is simply a move with no authoritative effect.
pub trait Game: Sized {
    /// Shared board shape.
    type Board: BoardValue;
    /// Per-user private board shape. Use `()` for games without one.
    type Playerboard: BoardValue;
    /// Hidden board shape. Use `()` for games without one.
    type Secretboard: BoardValue;
    /// Closed set of player moves (variant = name, fields = payload).
    type PlayerMove: MoveValue;
    /// Closed set of board moves.
    type BoardMove: MoveValue;

    /// Static declaration: player bounds, stats, settings.
    fn config(&self) -> &GameConfig;

    /// Create the boards at match start.
    fn initial_boards(
        &self,
        ctx: &SetupContext,
        random: &mut dyn RandomSource,
    ) -> Result<InitialBoards<Self>, EngineError>;

    /// Per-user playerboard factory, consulted when `initial_boards` did not
    /// return playerboards wholesale.
    fn initial_playerboard(&self, _ctx: &SetupContext, _user: &UserId) -> Option<Self::Playerboard> {
        None
    }

    /// Pure legality predicate. Rejection fails the move with
    /// [`EngineError::IllegalMove`] before any state is touched.
    fn can_do(&self, _mv: &Self::PlayerMove, _ctx: &CanDoContext<'_, Self>) -> bool {
        true
    }

    /// Optimistic phase: mutate board/playerboards only.
    fn execute_now(
        &self,
        _mv: &Self::PlayerMove,
        _ctx: &mut NowContext<'_, Self>,
    ) -> Result<NowVerdict, EngineError> {
        Ok(NowVerdict::Proceed)
    }

    /// Authoritative phase: full state, randomness, side effects.
    fn execute(
        &self,
        _mv: &Self::PlayerMove,
        _ctx: &mut MoveContext<'_, Self>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Board-move handler (no acting user).
    fn execute_board(
        &self,
        _mv: &Self::BoardMove,
        _ctx: &mut MoveContext<'_, Self>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Reserved move fired once when the match is created.
    /// `None` means the game does not handle match start.
    fn start_move(&self) -> Option<Self::BoardMove> {
        None
    }

    /// Reserved move fired when the match is force-aborted.
    /// `None` means the game does not handle aborts.
    fn abort_move(&self) -> Option<Self::BoardMove> {
        None
    }

    /// Decode a string-addressed move (host/bot boundary).
    /// `None` surfaces as [`EngineError::UnknownMove`].
    fn decode_player_move(&self, _name: &str, _payload: &Value) -> Option<Self::PlayerMove> {
        None
    }

    /// Stateless bot move selection. `None` means this game needs a
    /// stateful [`crate::sim::Agent`] for its bots.
    fn auto_move(&self, _view: &BotView<'_, Self>) -> Option<BotChoice<Self::PlayerMove>> {
        None
    }
}

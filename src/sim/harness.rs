//! The match simulator: a full backend without a network.
//!
//! `MatchSim` orchestrates the engine, turn controller, and scheduler over a
//! whole match - human moves, bot auto-moves, and a virtual clock that fires
//! delayed moves deterministically. It is the test harness for game rules
//! and the backend for local single-machine play; the semantics are
//! identical to what a live host gets from the same engine.
//!
//! ## Lifecycle
//!
//! Construction normalizes the game definition, seats the players, resolves
//! settings, builds the initial boards, and fires the reserved match-start
//! move. Then moves flow through [`MatchSim::make_move`] and time through
//! [`MatchSim::fast_forward`] until a handler ends the match.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::{MatchStatus, Meta, Ms, SeededRandom, UserId};
use crate::engine::{Engine, ExecuteOptions};
use crate::error::EngineError;
use crate::game::{Boards, BotView, Game, NormalizedGame, SetupContext};
use crate::patch::Patch;
use crate::schedule::{Scheduled, ScheduledAction, ScheduleSource, Scheduler};
use crate::turns;

use super::bots::Agent;
use super::persist::{Snapshot, Store, STORE_VERSION};

/// One seat at the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerSpec {
    pub id: UserId,
    pub bot: bool,
}

/// Match construction parameters.
///
/// Players seat in the order given; `with_bots` appends, `with_player`
/// intersperses.
#[derive(Clone, Debug)]
pub struct MatchSetup {
    pub players: Vec<PlayerSpec>,
    pub seed: u64,
    pub locale: String,
    pub start_at: Ms,
}

impl MatchSetup {
    /// Start an empty setup with the given RNG seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            players: Vec::new(),
            seed,
            locale: "en".to_string(),
            start_at: 0,
        }
    }

    /// Seat a human player.
    #[must_use]
    pub fn with_human(mut self, id: impl Into<String>) -> Self {
        self.players.push(PlayerSpec {
            id: UserId::new(id),
            bot: false,
        });
        self
    }

    /// Append `count` bots, named `bot-1`, `bot-2`, ... after the seats
    /// already present.
    #[must_use]
    pub fn with_bots(mut self, count: usize) -> Self {
        let existing = self.players.iter().filter(|p| p.bot).count();
        for i in 0..count {
            self.players.push(PlayerSpec {
                id: UserId::new(format!("bot-{}", existing + i + 1)),
                bot: true,
            });
        }
        self
    }

    /// Seat a player at the next position, human or bot.
    #[must_use]
    pub fn with_player(mut self, id: impl Into<String>, bot: bool) -> Self {
        self.players.push(PlayerSpec {
            id: UserId::new(id),
            bot,
        });
        self
    }

    /// Set the match locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Set the virtual clock's starting timestamp.
    #[must_use]
    pub fn starting_at(mut self, at: Ms) -> Self {
        self.start_at = at;
        self
    }
}

/// Per-call move options.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveOptions {
    /// Tolerate recoverable failures (illegal moves, handler errors):
    /// the call returns [`MoveResult::Rejected`] instead of an error, with
    /// state untouched. Structural errors (unknown move/player, undeclared
    /// stat) still propagate - they are bugs, not outcomes.
    pub can_fail: bool,
}

impl MoveOptions {
    /// `can_fail: true`.
    #[must_use]
    pub fn tolerant() -> Self {
        Self { can_fail: true }
    }
}

/// Outcome of a tolerated move submission.
#[derive(Clone, Debug, PartialEq)]
pub enum MoveResult {
    /// The move committed; here are its patches.
    Applied(Vec<Patch>),
    /// The move failed and was tolerated; nothing changed.
    Rejected,
}

impl MoveResult {
    /// Whether the move committed.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, MoveResult::Applied(_))
    }

    /// The committed patches (empty if rejected).
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        match self {
            MoveResult::Applied(patches) => patches,
            MoveResult::Rejected => &[],
        }
    }
}

/// Consecutive moves by one bot without a turn change before the harness
/// declares a probable infinite loop.
pub const MAX_CONSECUTIVE_BOT_MOVES: u32 = 1000;

/// A simulated match.
pub struct MatchSim<G: Game> {
    game: G,
    norm: NormalizedGame,
    boards: Boards<G>,
    meta: Meta,
    scheduler: Scheduler<G::PlayerMove, G::BoardMove>,
    clock: Ms,
    random: SeededRandom,
    status: MatchStatus,
    match_stats: BTreeMap<String, i64>,
    player_stats: BTreeMap<UserId, BTreeMap<String, i64>>,
    agents: BTreeMap<UserId, Box<dyn Agent<G>>>,
}

impl<G: Game> std::fmt::Debug for MatchSim<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSim")
            .field("norm", &self.norm)
            .field("board", &self.boards.board)
            .field("playerboards", &self.boards.playerboards)
            .field("secretboard", &self.boards.secretboard)
            .field("meta", &self.meta)
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("random", &self.random)
            .field("status", &self.status)
            .field("match_stats", &self.match_stats)
            .field("player_stats", &self.player_stats)
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<G: Game> MatchSim<G> {
    /// Create and start a match: validate the config, seat the players,
    /// resolve settings, build the initial boards, and fire the reserved
    /// match-start move.
    pub fn new(game: G, setup: MatchSetup) -> Result<Self, EngineError> {
        let norm = NormalizedGame::new(game.config().clone())?;
        norm.check_player_count(setup.players.len())?;

        let mut meta = Meta::new(setup.locale);
        for spec in &setup.players {
            meta.add_player(spec.id.clone(), spec.bot, setup.start_at);
        }
        meta.settings = norm.default_game_settings();

        let users = meta.user_ids();
        let player_settings = norm.assign_player_settings(&users)?;
        for (user, settings) in &player_settings {
            if let Some(player) = meta.player_mut(user) {
                player.settings = settings.clone();
            }
        }

        let ctx = SetupContext {
            users: users.clone(),
            settings: meta.settings.clone(),
            player_settings,
        };

        let mut random = SeededRandom::new(setup.seed);
        let initial = game.initial_boards(&ctx, &mut random)?;
        let playerboards = match initial.playerboards {
            Some(playerboards) => playerboards,
            None => users
                .iter()
                .filter_map(|u| game.initial_playerboard(&ctx, u).map(|pb| (u.clone(), pb)))
                .collect(),
        };

        let mut sim = Self {
            game,
            norm,
            boards: Boards {
                board: initial.board,
                playerboards,
                secretboard: initial.secretboard,
            },
            meta,
            scheduler: Scheduler::new(),
            clock: setup.start_at,
            random,
            status: MatchStatus::Running,
            match_stats: BTreeMap::new(),
            player_stats: BTreeMap::new(),
            agents: BTreeMap::new(),
        };

        if let Some(mv) = sim.game.start_move() {
            sim.fire_board_move(&mv)?;
        }

        Ok(sim)
    }

    /// Register a stateful agent for a bot seat.
    pub fn set_agent(&mut self, user_id: UserId, agent: Box<dyn Agent<G>>) {
        self.agents.insert(user_id, agent);
    }

    // === State access ===

    /// The shared board.
    #[must_use]
    pub fn board(&self) -> &G::Board {
        &self.boards.board
    }

    /// A user's playerboard.
    #[must_use]
    pub fn playerboard(&self, user_id: &UserId) -> Option<&G::Playerboard> {
        self.boards.playerboards.get(user_id)
    }

    /// The secretboard.
    #[must_use]
    pub fn secretboard(&self) -> Option<&G::Secretboard> {
        self.boards.secretboard.as_ref()
    }

    /// All three state roots.
    #[must_use]
    pub fn boards(&self) -> &Boards<G> {
        &self.boards
    }

    /// Match metadata.
    #[must_use]
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The virtual clock.
    #[must_use]
    pub fn clock(&self) -> Ms {
        self.clock
    }

    /// Match lifecycle state.
    #[must_use]
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Latest value of a match stat.
    #[must_use]
    pub fn match_stat(&self, key: &str) -> Option<i64> {
        self.match_stats.get(key).copied()
    }

    /// Latest value of a player stat.
    #[must_use]
    pub fn player_stat(&self, user_id: &UserId, key: &str) -> Option<i64> {
        self.player_stats.get(user_id)?.get(key).copied()
    }

    /// Number of pending delayed moves.
    #[must_use]
    pub fn pending_delayed_moves(&self) -> usize {
        self.scheduler.len()
    }

    // === Moves ===

    /// Submit a player move.
    ///
    /// With `can_fail`, recoverable failures (illegal move, handler error,
    /// match already over) come back as [`MoveResult::Rejected`] with state
    /// untouched; structural errors always propagate.
    pub fn make_move(
        &mut self,
        user_id: &UserId,
        mv: &G::PlayerMove,
        opts: &MoveOptions,
    ) -> Result<MoveResult, EngineError> {
        match self.try_player_move(user_id, mv, &ExecuteOptions::default()) {
            Ok(patches) => Ok(MoveResult::Applied(patches)),
            Err(err) if opts.can_fail && tolerable(&err) => {
                log::warn!("tolerated failed move by {}: {}", user_id, err);
                Ok(MoveResult::Rejected)
            }
            Err(err) => Err(err),
        }
    }

    /// Submit a move by name with a JSON payload (host/bot boundary).
    pub fn make_move_named(
        &mut self,
        user_id: &UserId,
        name: &str,
        payload: &Value,
        opts: &MoveOptions,
    ) -> Result<MoveResult, EngineError> {
        let Some(mv) = self.game.decode_player_move(name, payload) else {
            return Err(EngineError::UnknownMove(name.to_string()));
        };
        self.make_move(user_id, &mv, opts)
    }

    /// Force-abort the match: fire the reserved abort move (if the game
    /// defines one), end the match, drop pending delayed moves.
    pub fn abort(&mut self) {
        if self.status == MatchStatus::Ended {
            return;
        }
        if let Some(mv) = self.game.abort_move() {
            if let Err(err) = self.fire_board_move(&mv) {
                log::warn!("abort move failed: {}", err);
            }
        }
        self.status = MatchStatus::Ended;
        self.scheduler.clear();
        log::info!("match aborted at {}", self.clock);
    }

    // === Virtual clock ===

    /// Advance the virtual clock, firing due delayed moves in order.
    ///
    /// The clock jumps to each fired move's exact `fires_at` before the move
    /// runs, so handlers observe the correct "now" and anything they
    /// schedule is ordered against the remaining delta. With nothing due,
    /// the clock simply advances by `delta`.
    pub fn fast_forward(&mut self, delta: Ms) {
        let horizon = self.clock + delta;
        loop {
            let Some(entry) = self.scheduler.pop_due(horizon) else {
                self.clock = horizon;
                return;
            };
            self.clock = self.clock.max(entry.fires_at);
            self.fire_scheduled(entry);
        }
    }

    // === Bots ===

    /// Let the first bot whose turn it is make one move.
    ///
    /// Returns the bot that moved, or `None` when no bot can act.
    pub fn make_next_bot_move(&mut self) -> Result<Option<UserId>, EngineError> {
        if self.status == MatchStatus::Ended {
            return Ok(None);
        }

        let Some(user_id) = self
            .meta
            .players()
            .iter()
            .find(|p| p.is_bot && p.its_your_turn)
            .map(|p| p.id.clone())
        else {
            return Ok(None);
        };

        let choice = {
            let view = BotView::<G> {
                user_id: &user_id,
                board: &self.boards.board,
                playerboard: self.boards.playerboards.get(&user_id),
                now: self.clock,
            };
            match self.agents.get_mut(&user_id) {
                Some(agent) => agent.choose_move(&view),
                None => self.game.auto_move(&view),
            }
        };

        let Some(choice) = choice else {
            log::warn!("bot {} has the turn but no move source", user_id);
            return Ok(None);
        };

        self.make_move(&user_id, &choice.mv, &MoveOptions::default())?;
        Ok(Some(user_id))
    }

    /// Run bots until none has the turn.
    ///
    /// Returns the number of bot moves made. A single bot exceeding
    /// [`MAX_CONSECUTIVE_BOT_MOVES`] without a turn change fails with
    /// [`EngineError::InfiniteBotLoop`] - the game almost certainly forgot
    /// to end its turn.
    pub fn run_bots(&mut self) -> Result<u32, EngineError> {
        self.run_bots_limited(MAX_CONSECUTIVE_BOT_MOVES)
    }

    /// [`MatchSim::run_bots`] with a custom consecutive-move bound.
    pub fn run_bots_limited(&mut self, max_streak: u32) -> Result<u32, EngineError> {
        let mut total = 0u32;
        let mut streak = 0u32;
        let mut last: Option<UserId> = None;

        while let Some(user_id) = self.make_next_bot_move()? {
            total += 1;
            if last.as_ref() == Some(&user_id) {
                streak += 1;
            } else {
                streak = 1;
                last = Some(user_id.clone());
            }
            if streak > max_streak {
                return Err(EngineError::InfiniteBotLoop {
                    user_id,
                    moves: streak,
                });
            }
        }

        Ok(total)
    }

    // === Persistence ===

    /// Capture a versioned snapshot of the whole match.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<G> {
        Snapshot {
            version: STORE_VERSION,
            store: Store {
                board: self.boards.board.clone(),
                playerboards: self.boards.playerboards.clone(),
                secretboard: self.boards.secretboard.clone(),
                meta: self.meta.clone(),
                match_status: self.status,
                match_stats: self.match_stats.clone(),
                player_stats: self.player_stats.clone(),
                delayed_moves: self.scheduler.entries().cloned().collect(),
                clock: self.clock,
                random: self.random.state(),
            },
        }
    }

    /// Resume a match from a snapshot. Agents are not persisted and must be
    /// re-registered.
    pub fn restore(game: G, snapshot: Snapshot<G>) -> Result<Self, EngineError> {
        if snapshot.version != STORE_VERSION {
            return Err(EngineError::StaleVersion {
                found: snapshot.version,
                expected: STORE_VERSION,
            });
        }
        let norm = NormalizedGame::new(game.config().clone())?;
        let store = snapshot.store;

        Ok(Self {
            game,
            norm,
            boards: Boards {
                board: store.board,
                playerboards: store.playerboards,
                secretboard: store.secretboard,
            },
            meta: store.meta,
            scheduler: Scheduler::from_entries(store.delayed_moves),
            clock: store.clock,
            random: SeededRandom::from_state(&store.random),
            status: store.match_status,
            match_stats: store.match_stats,
            player_stats: store.player_stats,
            agents: BTreeMap::new(),
        })
    }

    /// Snapshot as a JSON string.
    pub fn snapshot_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Resume from a JSON snapshot. The version field is probed before the
    /// full store is decoded, so a stale schema reports [`EngineError::StaleVersion`]
    /// rather than a decode failure.
    pub fn restore_json(game: G, json: &str) -> Result<Self, EngineError> {
        #[derive(serde::Deserialize)]
        struct Probe {
            version: u32,
        }

        let probe: Probe = serde_json::from_str(json)?;
        if probe.version != STORE_VERSION {
            return Err(EngineError::StaleVersion {
                found: probe.version,
                expected: STORE_VERSION,
            });
        }

        let snapshot: Snapshot<G> = serde_json::from_str(json)?;
        Self::restore(game, snapshot)
    }

    // === Internals ===

    fn try_player_move(
        &mut self,
        user_id: &UserId,
        mv: &G::PlayerMove,
        exec_opts: &ExecuteOptions,
    ) -> Result<Vec<Patch>, EngineError> {
        if self.status == MatchStatus::Ended {
            return Err(EngineError::MatchEnded);
        }
        let engine = Engine::new(&self.game, &self.norm);
        let out = engine.execute_player_move(
            user_id,
            mv,
            &self.boards,
            &self.meta,
            self.clock,
            &mut self.random,
            exec_opts,
        )?;
        Ok(self.apply_output(out))
    }

    fn fire_board_move(&mut self, mv: &G::BoardMove) -> Result<Vec<Patch>, EngineError> {
        let engine = Engine::new(&self.game, &self.norm);
        let out = engine.execute_board_move(
            mv,
            &self.boards,
            &self.meta,
            self.clock,
            &mut self.random,
        )?;
        Ok(self.apply_output(out))
    }

    /// Commit a move output: swap in the boards, then apply side effects
    /// outside the transactional draft.
    fn apply_output(&mut self, out: crate::engine::MoveOutput<G>) -> Vec<Patch> {
        self.boards = Boards {
            board: out.board,
            playerboards: out.playerboards,
            secretboard: out.secretboard,
        };

        for rec in out.stats {
            match rec.user_id {
                Some(user) => {
                    self.player_stats
                        .entry(user)
                        .or_default()
                        .insert(rec.key, rec.value);
                }
                None => {
                    self.match_stats.insert(rec.key, rec.value);
                }
            }
        }

        for user in &out.end_turn {
            turns::apply_end(&mut self.meta, &mut self.scheduler, user);
        }
        for (user, begin) in &out.begin_turn {
            turns::apply_begin(&mut self.meta, &mut self.scheduler, user, begin, self.clock);
        }

        for req in out.delayed_moves {
            self.scheduler.schedule(Scheduled {
                fires_at: req.fires_at,
                action: req.action,
                source: ScheduleSource::Explicit,
            });
        }

        if out.match_has_ended {
            self.status = MatchStatus::Ended;
            self.scheduler.clear();
            log::info!("match ended at {}", self.clock);
        }

        out.patches
    }

    fn fire_scheduled(&mut self, entry: Scheduled<G::PlayerMove, G::BoardMove>) {
        if self.status == MatchStatus::Ended {
            log::debug!("discarding delayed move fired after match end");
            return;
        }

        match entry.action {
            ScheduledAction::Player { user_id, mv } => {
                if !self.meta.contains(&user_id) {
                    log::warn!("discarding delayed move for unknown player {}", user_id);
                    return;
                }
                let exec_opts = if entry.source == ScheduleSource::Expiration {
                    ExecuteOptions::expiration()
                } else {
                    ExecuteOptions::default()
                };
                if let Err(err) = self.try_player_move(&user_id, &mv, &exec_opts) {
                    log::warn!("delayed move for {} failed: {}", user_id, err);
                }
            }
            ScheduledAction::Board { mv } => {
                if let Err(err) = self.fire_board_move(&mv) {
                    log::warn!("delayed board move failed: {}", err);
                }
            }
            ScheduledAction::EndTurn { user_id } => {
                turns::apply_end(&mut self.meta, &mut self.scheduler, &user_id);
            }
        }
    }
}

fn tolerable(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::IllegalMove { .. } | EngineError::Handler(_) | EngineError::MatchEnded
    )
}

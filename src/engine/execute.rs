//! Transactional move execution.
//!
//! One call applies exactly one named move to the current state and returns
//! a complete result: the post-move boards, the minimal patch list, and the
//! accumulated side effects. Handlers mutate a cloned draft; on any handler
//! error the draft is dropped and the caller's state is untouched. There is
//! no partial commit.
//!
//! ## Patch order
//!
//! `execute_now` patches strictly precede `execute` patches, and one move's
//! patches are contiguous - the engine diffs after each phase against that
//! phase's snapshot.

use std::collections::{BTreeMap, BTreeSet};

use smallvec::smallvec;

use crate::core::{Meta, Ms, RandomSource, UserId};
use crate::error::EngineError;
use crate::game::{Boards, Game, NormalizedGame, NowVerdict};
use crate::patch::{diff_typed, Patch, PatchOp, PatchRoot};
use crate::schedule::ScheduledAction;

use super::effects::{BeginTurn, DelayedRequest, Effects, StatRecord, TurnOptions, TurnTargets};

/// How much of a player move to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Both phases. The authoritative path.
    Full,
    /// `execute_now` only - optimistic client prediction before the server
    /// confirms.
    NowOnly,
}

/// Per-call execution options.
#[derive(Clone, Copy, Debug)]
pub struct ExecuteOptions {
    /// Phase selection.
    pub mode: ExecMode,

    /// This invocation is a fired turn-expiration. If the handler does not
    /// begin the user's turn again, the engine ends it implicitly so expired
    /// turns cannot linger.
    pub is_expiration: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            mode: ExecMode::Full,
            is_expiration: false,
        }
    }
}

impl ExecuteOptions {
    /// Mark this call as a fired expiration.
    #[must_use]
    pub fn expiration() -> Self {
        Self {
            is_expiration: true,
            ..Self::default()
        }
    }

    /// Optimistic prediction mode.
    #[must_use]
    pub fn now_only() -> Self {
        Self {
            mode: ExecMode::NowOnly,
            ..Self::default()
        }
    }
}

/// Context for the `can_do` legality predicate. Read-only.
pub struct CanDoContext<'a, G: Game> {
    /// The acting user.
    pub user_id: &'a UserId,

    /// Shared board.
    pub board: &'a G::Board,

    /// The acting user's playerboard, if any.
    pub playerboard: Option<&'a G::Playerboard>,

    /// Current match time.
    pub now: Ms,
}

/// Context for the optimistic `execute_now` phase.
///
/// Deliberately narrow: no secretboard, no randomness, no side effects -
/// everything here can be replayed on a client.
pub struct NowContext<'a, G: Game> {
    /// Shared board draft.
    pub board: &'a mut G::Board,

    /// Playerboard drafts.
    pub playerboards: &'a mut BTreeMap<UserId, G::Playerboard>,

    /// The acting user.
    pub user_id: &'a UserId,

    /// Current match time.
    pub now: Ms,
}

impl<'a, G: Game> NowContext<'a, G> {
    /// The acting user's playerboard draft.
    pub fn own_playerboard(&mut self) -> Option<&mut G::Playerboard> {
        self.playerboards.get_mut(self.user_id)
    }
}

/// Context for the authoritative `execute` phase (and board moves).
pub struct MoveContext<'a, G: Game> {
    /// Shared board draft.
    pub board: &'a mut G::Board,

    /// Playerboard drafts.
    pub playerboards: &'a mut BTreeMap<UserId, G::Playerboard>,

    /// Secretboard draft.
    pub secretboard: &'a mut Option<G::Secretboard>,

    /// The acting user. `None` for board moves.
    pub user_id: Option<&'a UserId>,

    /// Current match time.
    pub now: Ms,

    /// Whether this invocation is a fired turn-expiration.
    pub is_expiration: bool,

    users: &'a [UserId],
    random: &'a mut dyn RandomSource,
    effects: &'a mut Effects<G::PlayerMove, G::BoardMove>,
    norm: &'a NormalizedGame,
}

impl<'a, G: Game> MoveContext<'a, G> {
    /// The authoritative random source.
    pub fn random(&mut self) -> &mut dyn RandomSource {
        &mut *self.random
    }

    /// Registered users in registration order.
    #[must_use]
    pub fn users(&self) -> &[UserId] {
        self.users
    }

    /// The acting user's playerboard draft.
    pub fn own_playerboard(&mut self) -> Option<&mut G::Playerboard> {
        let user = self.user_id?;
        self.playerboards.get_mut(user)
    }

    /// Request turn begin for the targets, with optional deadline.
    pub fn begin_turn(
        &mut self,
        targets: impl Into<TurnTargets>,
        opts: TurnOptions<G::PlayerMove, G::BoardMove>,
    ) {
        let users = targets.into().resolve(self.users);
        self.effects.begin(users, self.now, opts);
    }

    /// Request turn end for the targets.
    pub fn end_turn(&mut self, targets: impl Into<TurnTargets>) {
        let users = targets.into().resolve(self.users);
        self.effects.end(users);
    }

    /// Schedule a player move to fire `after` ms from now.
    pub fn delay_player_move(&mut self, user_id: &UserId, mv: G::PlayerMove, after: Ms) {
        self.effects.delay(
            ScheduledAction::Player {
                user_id: user_id.clone(),
                mv,
            },
            self.now + after,
        );
    }

    /// Schedule a board move to fire `after` ms from now.
    pub fn delay_board_move(&mut self, mv: G::BoardMove, after: Ms) {
        self.effects
            .delay(ScheduledAction::Board { mv }, self.now + after);
    }

    /// Request match end. Idempotent.
    pub fn end_match(&mut self) {
        self.effects.end_match();
    }

    /// Log a per-player stat. The key must be declared in the game config.
    pub fn log_player_stat(
        &mut self,
        user_id: &UserId,
        key: &str,
        value: i64,
    ) -> Result<(), EngineError> {
        if !self.norm.has_player_stat(key) {
            return Err(EngineError::UndeclaredStat {
                key: key.to_string(),
            });
        }
        self.effects.log_stat(key, value, Some(user_id.clone()));
        Ok(())
    }

    /// Log a match-level stat. The key must be declared in the game config.
    pub fn log_match_stat(&mut self, key: &str, value: i64) -> Result<(), EngineError> {
        if !self.norm.has_match_stat(key) {
            return Err(EngineError::UndeclaredStat {
                key: key.to_string(),
            });
        }
        self.effects.log_stat(key, value, None);
        Ok(())
    }
}

/// The complete result of one move execution.
///
/// A value object: immutable once returned, and the only channel through
/// which a move communicates its effects.
pub struct MoveOutput<G: Game> {
    /// Post-move shared board.
    pub board: G::Board,

    /// Post-move playerboards.
    pub playerboards: BTreeMap<UserId, G::Playerboard>,

    /// Post-move secretboard.
    pub secretboard: Option<G::Secretboard>,

    /// Minimal patches, in execution order.
    pub patches: Vec<Patch>,

    /// `end_match` was requested.
    pub match_has_ended: bool,

    /// Turn-begin requests by user.
    pub begin_turn: BTreeMap<UserId, BeginTurn<G::PlayerMove, G::BoardMove>>,

    /// Turn-end requests.
    pub end_turn: BTreeSet<UserId>,

    /// Explicitly delayed moves.
    pub delayed_moves: Vec<DelayedRequest<G::PlayerMove, G::BoardMove>>,

    /// Logged stats.
    pub stats: Vec<StatRecord>,
}

impl<G: Game> std::fmt::Debug for MoveOutput<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveOutput")
            .field("board", &self.board)
            .field("playerboards", &self.playerboards)
            .field("secretboard", &self.secretboard)
            .field("patches", &self.patches)
            .field("match_has_ended", &self.match_has_ended)
            .field("begin_turn", &self.begin_turn)
            .field("end_turn", &self.end_turn)
            .field("delayed_moves", &self.delayed_moves)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<G: Game> MoveOutput<G> {
    fn assemble(
        draft: Boards<G>,
        patches: Vec<Patch>,
        effects: Effects<G::PlayerMove, G::BoardMove>,
    ) -> Self {
        Self {
            board: draft.board,
            playerboards: draft.playerboards,
            secretboard: draft.secretboard,
            patches,
            match_has_ended: effects.match_has_ended,
            begin_turn: effects.begin_turn,
            end_turn: effects.end_turn,
            delayed_moves: effects.delayed_moves,
            stats: effects.stats,
        }
    }

    /// The post-move boards, consuming the output.
    #[must_use]
    pub fn into_boards(self) -> Boards<G> {
        Boards {
            board: self.board,
            playerboards: self.playerboards,
            secretboard: self.secretboard,
        }
    }
}

/// The move execution engine.
///
/// Stateless between calls: all match state flows in and out of each
/// execution. Hosts inject the game, the normalized config, and the random
/// source - there are no global registration points.
pub struct Engine<'g, G: Game> {
    game: &'g G,
    norm: &'g NormalizedGame,
}

impl<'g, G: Game> Engine<'g, G> {
    /// Create an engine over a game and its normalized configuration.
    #[must_use]
    pub fn new(game: &'g G, norm: &'g NormalizedGame) -> Self {
        Self { game, norm }
    }

    /// Execute a player move.
    ///
    /// Phases: `can_do` (reject with [`EngineError::IllegalMove`]), then
    /// `execute_now` on board + playerboards, then - unless cancelled or in
    /// [`ExecMode::NowOnly`] - `execute` with full state and side effects.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_player_move(
        &self,
        user_id: &UserId,
        mv: &G::PlayerMove,
        boards: &Boards<G>,
        meta: &Meta,
        now: Ms,
        random: &mut dyn RandomSource,
        options: &ExecuteOptions,
    ) -> Result<MoveOutput<G>, EngineError> {
        if !meta.contains(user_id) {
            return Err(EngineError::UnknownPlayer(user_id.clone()));
        }

        let can_ctx = CanDoContext {
            user_id,
            board: &boards.board,
            playerboard: boards.playerboards.get(user_id),
            now,
        };
        if !self.game.can_do(mv, &can_ctx) {
            return Err(EngineError::IllegalMove {
                user_id: user_id.clone(),
            });
        }

        let users = meta.user_ids();
        let mut draft = boards.clone();
        let mut effects = Effects::default();
        let mut patches = Vec::new();

        let verdict = {
            let mut ctx = NowContext::<G> {
                board: &mut draft.board,
                playerboards: &mut draft.playerboards,
                user_id,
                now,
            };
            self.game.execute_now(mv, &mut ctx)?
        };
        diff_board_phase::<G>(&boards.board, &draft.board, &mut patches)?;
        diff_playerboards::<G>(&boards.playerboards, &draft.playerboards, &mut patches)?;

        if verdict == NowVerdict::Proceed && options.mode == ExecMode::Full {
            let snapshot = draft.clone();
            {
                let mut ctx = MoveContext::<G> {
                    board: &mut draft.board,
                    playerboards: &mut draft.playerboards,
                    secretboard: &mut draft.secretboard,
                    user_id: Some(user_id),
                    now,
                    is_expiration: options.is_expiration,
                    users: &users,
                    random,
                    effects: &mut effects,
                    norm: self.norm,
                };
                self.game.execute(mv, &mut ctx)?;
            }
            diff_board_phase::<G>(&snapshot.board, &draft.board, &mut patches)?;
            diff_playerboards::<G>(&snapshot.playerboards, &draft.playerboards, &mut patches)?;
            diff_secretboard::<G>(&snapshot.secretboard, &draft.secretboard, &mut patches)?;
        }

        // A fired expiration that did not re-begin the turn ends it, so an
        // automatic default move can never leave its turn dangling.
        if options.is_expiration && !effects.begin_turn.contains_key(user_id) {
            effects.end_turn.insert(user_id.clone());
        }

        log::debug!(
            "player move {:?} by {}: {} patches, {} stats, ended={}",
            mv,
            user_id,
            patches.len(),
            effects.stats.len(),
            effects.match_has_ended
        );

        Ok(MoveOutput::assemble(draft, patches, effects))
    }

    /// Execute a board move: the `execute` phase only, with no acting user.
    pub fn execute_board_move(
        &self,
        mv: &G::BoardMove,
        boards: &Boards<G>,
        meta: &Meta,
        now: Ms,
        random: &mut dyn RandomSource,
    ) -> Result<MoveOutput<G>, EngineError> {
        let users = meta.user_ids();
        let mut draft = boards.clone();
        let mut effects = Effects::default();
        let mut patches = Vec::new();

        {
            let mut ctx = MoveContext::<G> {
                board: &mut draft.board,
                playerboards: &mut draft.playerboards,
                secretboard: &mut draft.secretboard,
                user_id: None,
                now,
                is_expiration: false,
                users: &users,
                random,
                effects: &mut effects,
                norm: self.norm,
            };
            self.game.execute_board(mv, &mut ctx)?;
        }
        diff_board_phase::<G>(&boards.board, &draft.board, &mut patches)?;
        diff_playerboards::<G>(&boards.playerboards, &draft.playerboards, &mut patches)?;
        diff_secretboard::<G>(&boards.secretboard, &draft.secretboard, &mut patches)?;

        log::debug!(
            "board move {:?}: {} patches, ended={}",
            mv,
            patches.len(),
            effects.match_has_ended
        );

        Ok(MoveOutput::assemble(draft, patches, effects))
    }
}

fn diff_board_phase<G: Game>(
    before: &G::Board,
    after: &G::Board,
    out: &mut Vec<Patch>,
) -> Result<(), EngineError> {
    if before != after {
        out.extend(diff_typed(&PatchRoot::Board, before, after)?);
    }
    Ok(())
}

fn diff_playerboards<G: Game>(
    before: &BTreeMap<UserId, G::Playerboard>,
    after: &BTreeMap<UserId, G::Playerboard>,
    out: &mut Vec<Patch>,
) -> Result<(), EngineError> {
    for (user, b) in before {
        let root = PatchRoot::Playerboard(user.clone());
        match after.get(user) {
            Some(a) if a == b => {}
            Some(a) => out.extend(diff_typed(&root, b, a)?),
            None => out.push(Patch::new(root, smallvec![], PatchOp::Remove)),
        }
    }
    for (user, a) in after {
        if !before.contains_key(user) {
            out.push(Patch::new(
                PatchRoot::Playerboard(user.clone()),
                smallvec![],
                PatchOp::Set(serde_json::to_value(a)?),
            ));
        }
    }
    Ok(())
}

fn diff_secretboard<G: Game>(
    before: &Option<G::Secretboard>,
    after: &Option<G::Secretboard>,
    out: &mut Vec<Patch>,
) -> Result<(), EngineError> {
    match (before, after) {
        (Some(b), Some(a)) if b != a => {
            out.extend(diff_typed(&PatchRoot::Secretboard, b, a)?);
        }
        (None, Some(a)) => out.push(Patch::new(
            PatchRoot::Secretboard,
            smallvec![],
            PatchOp::Set(serde_json::to_value(a)?),
        )),
        (Some(_), None) => out.push(Patch::new(
            PatchRoot::Secretboard,
            smallvec![],
            PatchOp::Remove,
        )),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RandomExt, ScriptedRandom};
    use crate::game::{GameConfig, InitialBoards, SetupContext};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Board {
        total: i64,
        note: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
    struct PBoard {
        seen: Vec<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Secret {
        deck: Vec<i64>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    enum PMove {
        Add { amount: i64 },
        Mixed { text: String, amount: i64 },
        CancelAfterNote { text: String },
        Boom,
        DrawSecret,
        BadStat,
        EndTwice,
        Tick,
        KeepTurn,
        Later { amount: i64, after: Ms },
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    enum BMove {
        Reset,
    }

    struct TestGame {
        config: GameConfig,
    }

    impl TestGame {
        fn new() -> Self {
            Self {
                config: GameConfig::new(1, 4)
                    .with_player_stat("adds")
                    .with_match_stat("total"),
            }
        }
    }

    impl Game for TestGame {
        type Board = Board;
        type Playerboard = PBoard;
        type Secretboard = Secret;
        type PlayerMove = PMove;
        type BoardMove = BMove;

        fn config(&self) -> &GameConfig {
            &self.config
        }

        fn initial_boards(
            &self,
            _ctx: &SetupContext,
            _random: &mut dyn RandomSource,
        ) -> Result<InitialBoards<Self>, EngineError> {
            Ok(InitialBoards::new(Board {
                total: 0,
                note: None,
            }))
        }

        fn can_do(&self, mv: &PMove, _ctx: &CanDoContext<'_, Self>) -> bool {
            !matches!(mv, PMove::Add { amount } if *amount < 0)
        }

        fn execute_now(
            &self,
            mv: &PMove,
            ctx: &mut NowContext<'_, Self>,
        ) -> Result<NowVerdict, EngineError> {
            match mv {
                PMove::Mixed { text, .. } | PMove::CancelAfterNote { text } => {
                    if let Some(pb) = ctx.own_playerboard() {
                        pb.seen.push(text.clone());
                    }
                    if matches!(mv, PMove::CancelAfterNote { .. }) {
                        return Ok(NowVerdict::Cancel);
                    }
                    Ok(NowVerdict::Proceed)
                }
                _ => Ok(NowVerdict::Proceed),
            }
        }

        fn execute(
            &self,
            mv: &PMove,
            ctx: &mut MoveContext<'_, Self>,
        ) -> Result<(), EngineError> {
            let user = ctx.user_id.expect("player move").clone();
            match mv {
                PMove::Add { amount } | PMove::Mixed { amount, .. } => {
                    ctx.board.total += amount;
                    let total = ctx.board.total;
                    ctx.log_player_stat(&user, "adds", 1)?;
                    ctx.log_match_stat("total", total)?;
                }
                PMove::CancelAfterNote { .. } => {
                    // never reached: the Cancel verdict skips this phase
                    ctx.board.total += 1_000_000;
                }
                PMove::Boom => {
                    ctx.board.total += 999;
                    return Err(EngineError::handler("boom"));
                }
                PMove::DrawSecret => {
                    let drawn = ctx
                        .secretboard
                        .as_mut()
                        .and_then(|s| s.deck.pop())
                        .ok_or_else(|| EngineError::handler("secret deck empty"))?;
                    let roll = ctx.random().roll(6);
                    ctx.board.total += drawn + i64::from(roll);
                }
                PMove::BadStat => {
                    ctx.log_match_stat("undeclared", 1)?;
                }
                PMove::EndTwice => {
                    ctx.end_match();
                    ctx.end_match();
                }
                PMove::Tick => {}
                PMove::KeepTurn => {
                    ctx.begin_turn(&user, TurnOptions::open().expires_in(1000));
                }
                PMove::Later { amount, after } => {
                    ctx.delay_player_move(&user, PMove::Add { amount: *amount }, *after);
                    ctx.delay_board_move(BMove::Reset, after * 2);
                }
            }
            Ok(())
        }

        fn execute_board(
            &self,
            mv: &BMove,
            ctx: &mut MoveContext<'_, Self>,
        ) -> Result<(), EngineError> {
            match mv {
                BMove::Reset => {
                    ctx.board.total = 0;
                    ctx.end_turn(TurnTargets::All);
                }
            }
            Ok(())
        }
    }

    fn setup() -> (TestGame, NormalizedGame, Boards<TestGame>, Meta) {
        let game = TestGame::new();
        let norm = NormalizedGame::new(game.config.clone()).unwrap();

        let mut boards = Boards::new(Board {
            total: 0,
            note: None,
        });
        boards
            .playerboards
            .insert(UserId::new("alice"), PBoard::default());
        boards
            .playerboards
            .insert(UserId::new("bob"), PBoard::default());
        boards.secretboard = Some(Secret { deck: vec![10, 20] });

        let mut meta = Meta::new("en");
        meta.add_player(UserId::new("alice"), false, 0);
        meta.add_player(UserId::new("bob"), false, 0);

        (game, norm, boards, meta)
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[test]
    fn test_unknown_player_rejected() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let err = engine
            .execute_player_move(
                &UserId::new("mallory"),
                &PMove::Add { amount: 1 },
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::UnknownPlayer(_)));
    }

    #[test]
    fn test_can_do_rejection_is_illegal_move() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let err = engine
            .execute_player_move(
                &alice(),
                &PMove::Add { amount: -5 },
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::IllegalMove { .. }));
    }

    #[test]
    fn test_successful_move_produces_patches_and_state() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::Add { amount: 7 },
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert_eq!(out.board.total, 7);
        assert_eq!(out.patches.len(), 1);
        assert_eq!(format!("{}", out.patches[0]), "board.total = 7");
        assert_eq!(out.stats.len(), 2);
        // Original untouched
        assert_eq!(boards.board.total, 0);
    }

    #[test]
    fn test_execute_now_patches_precede_execute_patches() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::Mixed {
                    text: "hello".to_string(),
                    amount: 3,
                },
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert_eq!(out.patches.len(), 2);
        // Phase 1: alice's playerboard. Phase 2: the board.
        assert_eq!(out.patches[0].root, PatchRoot::Playerboard(alice()));
        assert_eq!(out.patches[1].root, PatchRoot::Board);
    }

    #[test]
    fn test_cancel_keeps_now_patches_and_skips_execute() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::CancelAfterNote {
                    text: "stop".to_string(),
                },
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        // execute never ran: board untouched, only the playerboard patch
        assert_eq!(out.board.total, 0);
        assert_eq!(out.patches.len(), 1);
        assert_eq!(out.patches[0].root, PatchRoot::Playerboard(alice()));
    }

    #[test]
    fn test_now_only_mode_skips_execute() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::Mixed {
                    text: "predicted".to_string(),
                    amount: 3,
                },
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::now_only(),
            )
            .unwrap();

        assert_eq!(out.board.total, 0);
        assert_eq!(out.patches.len(), 1);
        assert_eq!(out.patches[0].root, PatchRoot::Playerboard(alice()));
    }

    #[test]
    fn test_handler_error_aborts_with_no_output() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let err = engine
            .execute_player_move(
                &alice(),
                &PMove::Boom,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::Handler(_)));
        // Caller's boards were never touched
        assert_eq!(boards.board.total, 0);
    }

    #[test]
    fn test_secretboard_patches_tagged_secret() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::of_rolls([4]);

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::DrawSecret,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        // drew 20, rolled 4
        assert_eq!(out.board.total, 24);
        assert!(out
            .patches
            .iter()
            .any(|p| p.root == PatchRoot::Secretboard));
        assert_eq!(out.secretboard.as_ref().unwrap().deck, vec![10]);
    }

    #[test]
    fn test_undeclared_stat_fails_fast() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let err = engine
            .execute_player_move(
                &alice(),
                &PMove::BadStat,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::UndeclaredStat { key } if key == "undeclared"));
    }

    #[test]
    fn test_end_match_idempotent_through_context() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::EndTwice,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert!(out.match_has_ended);
    }

    #[test]
    fn test_expiration_implicitly_ends_turn() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::Tick,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::expiration(),
            )
            .unwrap();

        assert!(out.end_turn.contains(&alice()));
    }

    #[test]
    fn test_expiration_respects_explicit_begin() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::KeepTurn,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::expiration(),
            )
            .unwrap();

        assert!(!out.end_turn.contains(&alice()));
        assert!(out.begin_turn.contains_key(&alice()));
        assert_eq!(out.begin_turn[&alice()].expires_at, Some(1000));
    }

    #[test]
    fn test_non_expiration_does_not_end_turn() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::Tick,
                &boards,
                &meta,
                0,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert!(out.end_turn.is_empty());
    }

    #[test]
    fn test_delayed_moves_carry_absolute_times() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_player_move(
                &alice(),
                &PMove::Later {
                    amount: 5,
                    after: 2000,
                },
                &boards,
                &meta,
                1000,
                &mut rng,
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert_eq!(out.delayed_moves.len(), 2);
        assert_eq!(out.delayed_moves[0].fires_at, 3000);
        assert_eq!(out.delayed_moves[1].fires_at, 5000);
        assert!(matches!(
            out.delayed_moves[0].action,
            ScheduledAction::Player { .. }
        ));
        assert!(matches!(
            out.delayed_moves[1].action,
            ScheduledAction::Board { .. }
        ));
    }

    #[test]
    fn test_board_move_execution() {
        let (game, norm, mut boards, meta) = setup();
        boards.board.total = 42;
        let engine = Engine::new(&game, &norm);
        let mut rng = ScriptedRandom::default();

        let out = engine
            .execute_board_move(&BMove::Reset, &boards, &meta, 0, &mut rng)
            .unwrap();

        assert_eq!(out.board.total, 0);
        assert_eq!(out.end_turn.len(), 2);
        assert_eq!(out.patches.len(), 1);
    }

    #[test]
    fn test_identical_replay_produces_identical_patches() {
        let (game, norm, boards, meta) = setup();
        let engine = Engine::new(&game, &norm);

        let mut rng1 = ScriptedRandom::of_rolls([3]);
        let out1 = engine
            .execute_player_move(
                &alice(),
                &PMove::DrawSecret,
                &boards,
                &meta,
                0,
                &mut rng1,
                &ExecuteOptions::default(),
            )
            .unwrap();

        let mut rng2 = ScriptedRandom::of_rolls([3]);
        let out2 = engine
            .execute_player_move(
                &alice(),
                &PMove::DrawSecret,
                &boards,
                &meta,
                0,
                &mut rng2,
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert_eq!(out1.patches, out2.patches);
        assert_eq!(out1.board, out2.board);
    }
}

//! Dice race: a small complete game exercising the whole engine surface.
//!
//! Rules: players take turns rolling a d6 (up to three dice per move),
//! accumulating a running total. The first player whose total reaches the
//! target wins and the match ends on that exact move. A turn left alone for
//! a minute auto-rolls one die and passes.
//!
//! Exercises: match settings (the target), exclusive player settings
//! (colors), player and match stats, turn expiration with a default move,
//! bot auto-moves, and string-addressed submission.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::core::{Ms, RandomExt, RandomSource, UserId};
use crate::engine::{CanDoContext, ExpirationMove, MoveContext, TurnOptions, TurnTargets};
use crate::error::EngineError;
use crate::game::{
    BotChoice, BotView, Game, GameConfig, InitialBoards, SettingDef, SetupContext,
};

/// Shared board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiceBoard {
    /// Seat order, fixed at match start.
    pub order: Vec<UserId>,

    /// Running totals.
    pub totals: BTreeMap<UserId, i64>,

    /// Whose turn the rules think it is.
    pub current: Option<UserId>,

    /// Winning total to reach.
    pub target: i64,

    /// Set on the move that crosses the target.
    pub winner: Option<UserId>,
}

/// Per-player private board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DicePlayerboard {
    /// Assigned color (exclusive player setting).
    pub color: String,

    /// Dice rolled so far.
    pub rolls: u32,

    /// Last face rolled.
    pub last_roll: Option<u32>,
}

/// Player moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DiceMove {
    /// Roll `times` dice (1-3) and pass the turn.
    Roll { times: u32 },
}

/// Board moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DiceBoardMove {
    /// Reserved match-start move: hand the first seat the turn.
    Start,
    /// Reserved abort move: clear every turn.
    Abort,
}

/// The game definition.
pub struct DiceRace {
    config: GameConfig,
    turn_ms: Ms,
}

impl Default for DiceRace {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRace {
    /// Standard configuration: 2-4 players, target 20 (or 50 by setting),
    /// one-minute turns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GameConfig::new(2, 4)
                .with_player_stat("rolls")
                .with_match_stat("winning_total")
                .with_game_setting(
                    SettingDef::new("target")
                        .with_default_option("20")
                        .with_option("50"),
                )
                .with_player_setting(
                    SettingDef::new("color")
                        .with_option("red")
                        .with_option("blue")
                        .with_option("green")
                        .with_option("yellow")
                        .exclusive(),
                ),
            turn_ms: 60_000,
        }
    }

    /// Override the turn deadline.
    #[must_use]
    pub fn with_turn_timeout(mut self, turn_ms: Ms) -> Self {
        self.turn_ms = turn_ms;
        self
    }

    fn pass_turn(&self, ctx: &mut MoveContext<'_, Self>, from: &UserId) {
        let order = ctx.board.order.clone();
        let pos = order.iter().position(|u| u == from).unwrap_or(0);
        let next = order[(pos + 1) % order.len()].clone();

        ctx.board.current = Some(next.clone());
        ctx.end_turn(from);
        ctx.begin_turn(
            &next,
            TurnOptions::open()
                .expires_in(self.turn_ms)
                .on_expiration(ExpirationMove::Player(DiceMove::Roll { times: 1 })),
        );
    }
}

impl Game for DiceRace {
    type Board = DiceBoard;
    type Playerboard = DicePlayerboard;
    type Secretboard = ();
    type PlayerMove = DiceMove;
    type BoardMove = DiceBoardMove;

    fn config(&self) -> &GameConfig {
        &self.config
    }

    fn initial_boards(
        &self,
        ctx: &SetupContext,
        _random: &mut dyn RandomSource,
    ) -> Result<InitialBoards<Self>, EngineError> {
        let target: i64 = ctx
            .settings
            .get("target")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                EngineError::InvalidConfig("setting `target` is not an integer".to_string())
            })?;

        let board = DiceBoard {
            order: ctx.users.clone(),
            totals: ctx.users.iter().map(|u| (u.clone(), 0)).collect(),
            current: None,
            target,
            winner: None,
        };

        let playerboards = ctx
            .users
            .iter()
            .map(|u| {
                let color = ctx
                    .player_settings
                    .get(u)
                    .and_then(|s| s.get("color"))
                    .cloned()
                    .unwrap_or_default();
                (
                    u.clone(),
                    DicePlayerboard {
                        color,
                        rolls: 0,
                        last_roll: None,
                    },
                )
            })
            .collect();

        Ok(InitialBoards::new(board).with_playerboards(playerboards))
    }

    fn can_do(&self, mv: &DiceMove, ctx: &CanDoContext<'_, Self>) -> bool {
        let DiceMove::Roll { times } = mv;
        ctx.board.winner.is_none()
            && (1..=3).contains(times)
            && ctx.board.current.as_ref() == Some(ctx.user_id)
    }

    fn execute(
        &self,
        mv: &DiceMove,
        ctx: &mut MoveContext<'_, Self>,
    ) -> Result<(), EngineError> {
        let DiceMove::Roll { times } = mv;
        let user = ctx
            .user_id
            .ok_or_else(|| EngineError::handler("roll without a user"))?
            .clone();

        let mut rolled = 0u32;
        let mut last = None;
        for _ in 0..*times {
            let face = ctx.random().d6();
            rolled += 1;
            last = Some(face);
            *ctx.board.totals.entry(user.clone()).or_insert(0) += i64::from(face);
        }

        let total_rolls = {
            let pb = ctx
                .own_playerboard()
                .ok_or_else(|| EngineError::handler("missing playerboard"))?;
            pb.rolls += rolled;
            pb.last_roll = last;
            pb.rolls
        };
        ctx.log_player_stat(&user, "rolls", i64::from(total_rolls))?;

        let total = ctx.board.totals.get(&user).copied().unwrap_or(0);
        if total >= ctx.board.target {
            ctx.board.winner = Some(user.clone());
            ctx.board.current = None;
            ctx.log_match_stat("winning_total", total)?;
            ctx.end_turn(TurnTargets::All);
            ctx.end_match();
        } else {
            self.pass_turn(ctx, &user);
        }

        Ok(())
    }

    fn execute_board(
        &self,
        mv: &DiceBoardMove,
        ctx: &mut MoveContext<'_, Self>,
    ) -> Result<(), EngineError> {
        match mv {
            DiceBoardMove::Start => {
                let first = ctx
                    .board
                    .order
                    .first()
                    .ok_or_else(|| EngineError::handler("no players seated"))?
                    .clone();
                ctx.board.current = Some(first.clone());
                ctx.begin_turn(
                    &first,
                    TurnOptions::open()
                        .expires_in(self.turn_ms)
                        .on_expiration(ExpirationMove::Player(DiceMove::Roll { times: 1 })),
                );
            }
            DiceBoardMove::Abort => {
                ctx.board.current = None;
                ctx.end_turn(TurnTargets::All);
            }
        }
        Ok(())
    }

    fn start_move(&self) -> Option<DiceBoardMove> {
        Some(DiceBoardMove::Start)
    }

    fn abort_move(&self) -> Option<DiceBoardMove> {
        Some(DiceBoardMove::Abort)
    }

    fn decode_player_move(&self, name: &str, payload: &Value) -> Option<DiceMove> {
        match name {
            "roll" => {
                let times = if payload.is_null() {
                    1
                } else {
                    payload.get("times")?.as_u64()? as u32
                };
                Some(DiceMove::Roll { times })
            }
            _ => None,
        }
    }

    fn auto_move(&self, _view: &BotView<'_, Self>) -> Option<BotChoice<DiceMove>> {
        Some(
            BotChoice::new(DiceMove::Roll { times: 1 })
                .with_info(json!({ "policy": "always-roll-once" })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_roll() {
        let game = DiceRace::new();

        assert_eq!(
            game.decode_player_move("roll", &Value::Null),
            Some(DiceMove::Roll { times: 1 })
        );
        assert_eq!(
            game.decode_player_move("roll", &json!({ "times": 3 })),
            Some(DiceMove::Roll { times: 3 })
        );
        assert_eq!(game.decode_player_move("jump", &Value::Null), None);
    }

    #[test]
    fn test_config_declares_stats_and_settings() {
        let game = DiceRace::new();
        let config = game.config();

        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 4);
        assert!(config.player_stats.contains(&"rolls".to_string()));
        assert!(config.match_stats.contains(&"winning_total".to_string()));
        assert!(config.player_settings[0].exclusive);
    }

    #[test]
    fn test_initial_boards_read_settings() {
        use crate::core::ScriptedRandom;

        let game = DiceRace::new();
        let users = vec![UserId::new("alice"), UserId::new("bob")];
        let mut player_settings = BTreeMap::new();
        for (u, color) in users.iter().zip(["red", "blue"]) {
            player_settings.insert(
                u.clone(),
                BTreeMap::from([("color".to_string(), color.to_string())]),
            );
        }
        let ctx = SetupContext {
            users: users.clone(),
            settings: BTreeMap::from([("target".to_string(), "50".to_string())]),
            player_settings,
        };

        let mut rng = ScriptedRandom::default();
        let initial = game.initial_boards(&ctx, &mut rng).unwrap();

        assert_eq!(initial.board.target, 50);
        assert_eq!(initial.board.order, users);
        let playerboards = initial.playerboards.unwrap();
        assert_eq!(playerboards[&UserId::new("alice")].color, "red");
        assert_eq!(playerboards[&UserId::new("bob")].color, "blue");
    }

    #[test]
    fn test_bad_target_setting_is_config_error() {
        use crate::core::ScriptedRandom;

        let game = DiceRace::new();
        let ctx = SetupContext {
            users: vec![UserId::new("a"), UserId::new("b")],
            settings: BTreeMap::from([("target".to_string(), "soon".to_string())]),
            player_settings: BTreeMap::new(),
        };

        let mut rng = ScriptedRandom::default();
        let err = game.initial_boards(&ctx, &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}

//! Bot move selection.
//!
//! Two ways to drive a bot, per the game's choice:
//!
//! - stateless: implement [`crate::game::Game::auto_move`] - a pure function
//!   of the bot's view, good for default/baseline bots
//! - stateful: register an [`Agent`] with the harness - an object that may
//!   carry search trees, learned policies, or per-match memory
//!
//! Either way the result is a [`BotChoice`]: the move itself plus optional
//! telemetry (decision info, duration) for training pipelines.

use crate::game::{BotChoice, BotView, Game};

/// A stateful bot.
///
/// `choose_move` returning `None` means the agent declines to act; the
/// harness logs it and leaves the turn alone.
pub trait Agent<G: Game> {
    fn choose_move(&mut self, view: &BotView<'_, G>) -> Option<BotChoice<G::PlayerMove>>;
}

/// Closures are agents: any `FnMut(&BotView) -> Option<BotChoice>` works.
impl<G, F> Agent<G> for F
where
    G: Game,
    F: FnMut(&BotView<'_, G>) -> Option<BotChoice<G::PlayerMove>>,
{
    fn choose_move(&mut self, view: &BotView<'_, G>) -> Option<BotChoice<G::PlayerMove>> {
        self(view)
    }
}

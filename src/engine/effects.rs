//! The side-effect accumulator.
//!
//! Handlers never touch `Meta` or the scheduler. They *request* framework
//! effects - turn changes, delayed moves, stats, match end - through the
//! move context, which records them here. The engine returns the accumulator
//! inside the move output, and the caller applies it outside the
//! transactional draft. A fresh accumulator is built per execution and
//! discarded with it; nothing here is ambient or global.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::{Ms, UserId};
use crate::schedule::ScheduledAction;

/// One logged stat value.
///
/// `user_id` present means a player stat; absent means a match stat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub key: String,
    pub value: i64,
    pub user_id: Option<UserId>,
}

/// Whose turns a request addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnTargets {
    /// Every registered player.
    All,
    /// An explicit set of players.
    Users(Vec<UserId>),
}

impl TurnTargets {
    /// A single user.
    #[must_use]
    pub fn user(id: &UserId) -> Self {
        TurnTargets::Users(vec![id.clone()])
    }

    /// Resolve against the registered roster.
    #[must_use]
    pub fn resolve(&self, roster: &[UserId]) -> Vec<UserId> {
        match self {
            TurnTargets::All => roster.to_vec(),
            TurnTargets::Users(ids) => ids.clone(),
        }
    }
}

impl From<&UserId> for TurnTargets {
    fn from(id: &UserId) -> Self {
        TurnTargets::user(id)
    }
}

impl From<UserId> for TurnTargets {
    fn from(id: UserId) -> Self {
        TurnTargets::Users(vec![id])
    }
}

impl From<Vec<UserId>> for TurnTargets {
    fn from(ids: Vec<UserId>) -> Self {
        TurnTargets::Users(ids)
    }
}

/// What fires if a turn's deadline passes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExpirationMove<PM, BM> {
    /// Run a player move on the expiring user's behalf (the "default move").
    Player(PM),
    /// Run a board move.
    Board(BM),
}

/// Options for beginning a turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOptions<PM, BM> {
    /// Deadline, relative to the move's `now`.
    pub expires_in: Option<Ms>,

    /// What to fire at the deadline. With a deadline but no move, the turn
    /// simply ends when it expires.
    pub on_expiration: Option<ExpirationMove<PM, BM>>,
}

impl<PM, BM> Default for TurnOptions<PM, BM> {
    fn default() -> Self {
        Self {
            expires_in: None,
            on_expiration: None,
        }
    }
}

impl<PM, BM> TurnOptions<PM, BM> {
    /// A turn with no deadline.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Set a deadline.
    #[must_use]
    pub fn expires_in(mut self, after: Ms) -> Self {
        self.expires_in = Some(after);
        self
    }

    /// Set the move fired at the deadline.
    #[must_use]
    pub fn on_expiration(mut self, mv: ExpirationMove<PM, BM>) -> Self {
        self.on_expiration = Some(mv);
        self
    }
}

/// A turn-begin request, resolved to an absolute deadline.
#[derive(Clone, Debug, PartialEq)]
pub struct BeginTurn<PM, BM> {
    /// Absolute deadline (`now + expires_in`), if one was set.
    pub expires_at: Option<Ms>,

    /// What fires at the deadline.
    pub on_expiration: Option<ExpirationMove<PM, BM>>,
}

/// An explicitly requested delayed move.
#[derive(Clone, Debug, PartialEq)]
pub struct DelayedRequest<PM, BM> {
    /// Absolute firing time (`now + delay`).
    pub fires_at: Ms,

    /// The action to fire.
    pub action: ScheduledAction<PM, BM>,
}

/// Everything a single move execution requested of the framework.
#[derive(Clone, Debug, PartialEq)]
pub struct Effects<PM, BM> {
    /// `end_match` was called at least once.
    pub match_has_ended: bool,

    /// Turn-begin requests by user. A later `begin` for the same user
    /// supersedes an earlier one.
    pub begin_turn: BTreeMap<UserId, BeginTurn<PM, BM>>,

    /// Turn-end requests.
    pub end_turn: BTreeSet<UserId>,

    /// Explicitly delayed moves, in request order.
    pub delayed_moves: Vec<DelayedRequest<PM, BM>>,

    /// Logged stats, in request order.
    pub stats: Vec<StatRecord>,
}

impl<PM, BM> Default for Effects<PM, BM> {
    fn default() -> Self {
        Self {
            match_has_ended: false,
            begin_turn: BTreeMap::new(),
            end_turn: BTreeSet::new(),
            delayed_moves: Vec::new(),
            stats: Vec::new(),
        }
    }
}

impl<PM, BM> Effects<PM, BM> {
    /// Record turn-begin requests. The latest request per user wins, and a
    /// begin overrides any earlier end for the same user.
    pub fn begin(&mut self, users: Vec<UserId>, now: Ms, opts: TurnOptions<PM, BM>)
    where
        PM: Clone,
        BM: Clone,
    {
        let expires_at = opts.expires_in.map(|after| now + after);
        for user in users {
            self.end_turn.remove(&user);
            self.begin_turn.insert(
                user,
                BeginTurn {
                    expires_at,
                    on_expiration: opts.on_expiration.clone(),
                },
            );
        }
    }

    /// Record turn-end requests. An end overrides any earlier begin for the
    /// same user.
    pub fn end(&mut self, users: Vec<UserId>) {
        for user in users {
            self.begin_turn.remove(&user);
            self.end_turn.insert(user);
        }
    }

    /// Record a delayed move.
    pub fn delay(&mut self, action: ScheduledAction<PM, BM>, fires_at: Ms) {
        self.delayed_moves.push(DelayedRequest { fires_at, action });
    }

    /// Request match end. Idempotent.
    pub fn end_match(&mut self) {
        self.match_has_ended = true;
    }

    /// Record a stat value.
    pub fn log_stat(&mut self, key: impl Into<String>, value: i64, user_id: Option<UserId>) {
        self.stats.push(StatRecord {
            key: key.into(),
            value,
            user_id,
        });
    }
}

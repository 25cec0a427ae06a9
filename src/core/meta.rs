//! Framework-owned match state: players, turns, settings.
//!
//! ## Meta
//!
//! `Meta` is the per-match bookkeeping the engine owns outright: the ordered
//! player list, whose turn it is, readiness, scores, and resolved settings.
//! Game code never mutates it directly - it requests turn changes through the
//! side-effect accumulator and the turn controller applies them here.
//!
//! Player order is insertion order and is significant: bot stepping and
//! exclusive setting assignment both walk it front to back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::user::UserId;

/// Millisecond timestamps and durations, host epoch.
pub type Ms = u64;

/// Lifecycle of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Moves are being accepted.
    Running,
    /// `end_match` was requested (or the match was aborted); no further
    /// moves apply.
    Ended,
}

/// Per-player framework state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerMeta {
    /// Host-assigned user id.
    pub id: UserId,

    /// Bots act through the harness and are exempt from turn expirations.
    pub is_bot: bool,

    /// Whether it is currently this player's turn.
    pub its_your_turn: bool,

    /// Whether the player has signalled readiness.
    pub ready: bool,

    /// Final or running score, game-assigned.
    pub score: Option<i64>,

    /// Final rank, game-assigned (1 = first place).
    pub rank: Option<u32>,

    /// When the player joined the match.
    pub joined_at: Ms,

    /// When the current turn began, if one is active.
    pub turn_began_at: Option<Ms>,

    /// When the current turn expires, if a deadline was set.
    pub turn_expires_at: Option<Ms>,

    /// Resolved per-player settings (value by setting key).
    pub settings: BTreeMap<String, String>,
}

impl PlayerMeta {
    /// Create a new player entry with turn state cleared.
    #[must_use]
    pub fn new(id: UserId, is_bot: bool, joined_at: Ms) -> Self {
        Self {
            id,
            is_bot,
            its_your_turn: false,
            ready: true,
            score: None,
            rank: None,
            joined_at,
            turn_began_at: None,
            turn_expires_at: None,
            settings: BTreeMap::new(),
        }
    }
}

/// Framework-owned match metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    players: Vec<PlayerMeta>,

    /// Resolved match-level settings (value by setting key).
    pub settings: BTreeMap<String, String>,

    /// BCP 47 locale tag for the match.
    pub locale: String,
}

impl Meta {
    /// Create an empty meta with the given locale.
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            players: Vec::new(),
            settings: BTreeMap::new(),
            locale: locale.into(),
        }
    }

    /// Register a player. Order of registration is preserved.
    pub fn add_player(&mut self, id: UserId, is_bot: bool, joined_at: Ms) {
        self.players.push(PlayerMeta::new(id, is_bot, joined_at));
    }

    /// All players in registration order.
    #[must_use]
    pub fn players(&self) -> &[PlayerMeta] {
        &self.players
    }

    /// Number of registered players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: &UserId) -> Option<&PlayerMeta> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Look up a player mutably.
    pub fn player_mut(&mut self, id: &UserId) -> Option<&mut PlayerMeta> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Whether a user is registered.
    #[must_use]
    pub fn contains(&self, id: &UserId) -> bool {
        self.player(id).is_some()
    }

    /// User ids in registration order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<UserId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    /// Users whose turn it currently is, in registration order.
    #[must_use]
    pub fn users_with_turn(&self) -> Vec<UserId> {
        self.players
            .iter()
            .filter(|p| p.its_your_turn)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Low-level turn flag primitive.
    ///
    /// Sets `its_your_turn` true for every id in `begin` (stamping
    /// `turn_began_at`) and false for every id in `end` (clearing both turn
    /// timestamps). Calling with both arguments `None` changes nothing - an
    /// explicit no-op, not an error. Unregistered ids are ignored.
    ///
    /// This only flips flags; expiration scheduling and cancellation live in
    /// the turn controller.
    pub fn its_your_turn(&mut self, now: Ms, begin: Option<&[UserId]>, end: Option<&[UserId]>) {
        if begin.is_none() && end.is_none() {
            return;
        }

        if let Some(ids) = end {
            for id in ids {
                if let Some(player) = self.player_mut(id) {
                    player.its_your_turn = false;
                    player.turn_began_at = None;
                    player.turn_expires_at = None;
                }
            }
        }

        if let Some(ids) = begin {
            for id in ids {
                if let Some(player) = self.player_mut(id) {
                    player.its_your_turn = true;
                    player.turn_began_at = Some(now);
                    // A new turn starts with no deadline until the turn
                    // controller sets one.
                    player.turn_expires_at = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(ids: &[&str]) -> Meta {
        let mut meta = Meta::new("en");
        for id in ids {
            meta.add_player(UserId::new(*id), false, 0);
        }
        meta
    }

    #[test]
    fn test_registration_order() {
        let meta = meta_with(&["carol", "alice", "bob"]);

        let ids = meta.user_ids();
        assert_eq!(ids[0].as_str(), "carol");
        assert_eq!(ids[1].as_str(), "alice");
        assert_eq!(ids[2].as_str(), "bob");
    }

    #[test]
    fn test_lookup() {
        let meta = meta_with(&["alice", "bob"]);

        assert!(meta.contains(&UserId::new("alice")));
        assert!(!meta.contains(&UserId::new("mallory")));
        assert_eq!(meta.player(&UserId::new("bob")).unwrap().id.as_str(), "bob");
    }

    #[test]
    fn test_its_your_turn_begin_and_end() {
        let mut meta = meta_with(&["alice", "bob"]);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        meta.its_your_turn(1000, Some(&[alice.clone()]), None);
        assert!(meta.player(&alice).unwrap().its_your_turn);
        assert_eq!(meta.player(&alice).unwrap().turn_began_at, Some(1000));
        assert!(!meta.player(&bob).unwrap().its_your_turn);

        meta.its_your_turn(2000, Some(&[bob.clone()]), Some(&[alice.clone()]));
        assert!(!meta.player(&alice).unwrap().its_your_turn);
        assert_eq!(meta.player(&alice).unwrap().turn_began_at, None);
        assert!(meta.player(&bob).unwrap().its_your_turn);
    }

    #[test]
    fn test_its_your_turn_no_args_is_noop() {
        let mut meta = meta_with(&["alice"]);
        let alice = UserId::new("alice");
        meta.its_your_turn(1000, Some(&[alice.clone()]), None);

        meta.its_your_turn(5000, None, None);

        let player = meta.player(&alice).unwrap();
        assert!(player.its_your_turn);
        assert_eq!(player.turn_began_at, Some(1000));
    }

    #[test]
    fn test_its_your_turn_unknown_user_ignored() {
        let mut meta = meta_with(&["alice"]);

        meta.its_your_turn(1000, Some(&[UserId::new("mallory")]), None);

        assert!(meta.users_with_turn().is_empty());
    }

    #[test]
    fn test_end_clears_expiration() {
        let mut meta = meta_with(&["alice"]);
        let alice = UserId::new("alice");

        meta.its_your_turn(1000, Some(&[alice.clone()]), None);
        meta.player_mut(&alice).unwrap().turn_expires_at = Some(61_000);

        meta.its_your_turn(2000, None, Some(&[alice.clone()]));
        assert_eq!(meta.player(&alice).unwrap().turn_expires_at, None);
    }

    #[test]
    fn test_meta_serde() {
        let mut meta = meta_with(&["alice", "bot-1"]);
        meta.settings.insert("target".to_string(), "20".to_string());

        let json = serde_json::to_string(&meta).unwrap();
        let back: Meta = serde_json::from_str(&json).unwrap();

        assert_eq!(meta, back);
    }
}

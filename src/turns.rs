//! The turn controller: applying turn changes to `Meta` and the scheduler.
//!
//! Each player's turn is a two-state machine (`idle ⇄ active`) with at most
//! one pending expiration entry in the scheduler. Beginning a turn cancels
//! and replaces any previous expiration for that user (silent supersede);
//! ending one cancels it. Bots never get expiration entries - they are
//! assumed to act promptly through the harness.
//!
//! This is the only code that flips `Meta` turn state from engine effects;
//! game handlers go through the accumulator.

use crate::core::{Meta, Ms, UserId};
use crate::engine::{BeginTurn, ExpirationMove, TurnOptions};
use crate::schedule::{Scheduled, ScheduledAction, ScheduleSource, Scheduler};

/// Apply a turn-begin effect for one user.
///
/// Cancels any outstanding expiration, marks the turn active, and - for
/// humans with a deadline - schedules exactly one expiration entry: the
/// declared default move, or a bare end-turn when none was declared.
pub fn apply_begin<PM: Clone, BM: Clone>(
    meta: &mut Meta,
    scheduler: &mut Scheduler<PM, BM>,
    user_id: &UserId,
    begin: &BeginTurn<PM, BM>,
    now: Ms,
) {
    if !meta.contains(user_id) {
        return;
    }

    scheduler.cancel_expirations_for(user_id);
    meta.its_your_turn(now, Some(std::slice::from_ref(user_id)), None);

    let is_bot = meta.player(user_id).is_some_and(|p| p.is_bot);

    if let Some(expires_at) = begin.expires_at {
        if let Some(player) = meta.player_mut(user_id) {
            player.turn_expires_at = Some(expires_at);
        }

        if !is_bot {
            let action = match &begin.on_expiration {
                Some(ExpirationMove::Player(mv)) => ScheduledAction::Player {
                    user_id: user_id.clone(),
                    mv: mv.clone(),
                },
                Some(ExpirationMove::Board(mv)) => ScheduledAction::Board { mv: mv.clone() },
                None => ScheduledAction::EndTurn {
                    user_id: user_id.clone(),
                },
            };
            scheduler.schedule(Scheduled {
                fires_at: expires_at,
                action,
                source: ScheduleSource::Expiration,
            });
        }
    }
}

/// Apply a turn-end effect for one user: clear the flag and cancel any
/// pending expiration.
pub fn apply_end<PM, BM>(meta: &mut Meta, scheduler: &mut Scheduler<PM, BM>, user_id: &UserId) {
    meta.its_your_turn(0, None, Some(std::slice::from_ref(user_id)));
    scheduler.cancel_expirations_for(user_id);
}

/// Host-facing begin: resolve targets and options, then apply.
pub fn begin<PM: Clone, BM: Clone>(
    meta: &mut Meta,
    scheduler: &mut Scheduler<PM, BM>,
    targets: &[UserId],
    opts: &TurnOptions<PM, BM>,
    now: Ms,
) {
    let begin = BeginTurn {
        expires_at: opts.expires_in.map(|after| now + after),
        on_expiration: opts.on_expiration.clone(),
    };
    for user_id in targets {
        apply_begin(meta, scheduler, user_id, &begin, now);
    }
}

/// Host-facing end for a set of users.
pub fn end<PM, BM>(meta: &mut Meta, scheduler: &mut Scheduler<PM, BM>, targets: &[UserId]) {
    for user_id in targets {
        apply_end(meta, scheduler, user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestScheduler = Scheduler<String, String>;

    fn uid(s: &str) -> UserId {
        UserId::new(s)
    }

    fn setup() -> (Meta, TestScheduler) {
        let mut meta = Meta::new("en");
        meta.add_player(uid("alice"), false, 0);
        meta.add_player(uid("bob"), false, 0);
        meta.add_player(uid("bot-1"), true, 0);
        (meta, TestScheduler::new())
    }

    fn timed(expires_at: Ms) -> BeginTurn<String, String> {
        BeginTurn {
            expires_at: Some(expires_at),
            on_expiration: Some(ExpirationMove::Player("default".to_string())),
        }
    }

    #[test]
    fn test_begin_sets_turn_and_schedules_expiration() {
        let (mut meta, mut sched) = setup();

        apply_begin(&mut meta, &mut sched, &uid("alice"), &timed(61_000), 1000);

        let player = meta.player(&uid("alice")).unwrap();
        assert!(player.its_your_turn);
        assert_eq!(player.turn_began_at, Some(1000));
        assert_eq!(player.turn_expires_at, Some(61_000));
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.peek().unwrap().fires_at, 61_000);
    }

    #[test]
    fn test_begin_supersedes_pending_expiration() {
        let (mut meta, mut sched) = setup();

        apply_begin(&mut meta, &mut sched, &uid("alice"), &timed(10_000), 0);
        apply_begin(&mut meta, &mut sched, &uid("alice"), &timed(99_000), 5000);

        // Old expiration cancelled, exactly one remains
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.peek().unwrap().fires_at, 99_000);
        assert_eq!(
            meta.player(&uid("alice")).unwrap().turn_expires_at,
            Some(99_000)
        );
    }

    #[test]
    fn test_end_cancels_only_that_users_expiration() {
        let (mut meta, mut sched) = setup();

        apply_begin(&mut meta, &mut sched, &uid("alice"), &timed(10_000), 0);
        apply_begin(&mut meta, &mut sched, &uid("bob"), &timed(20_000), 0);

        apply_end(&mut meta, &mut sched, &uid("bob"));

        assert!(!meta.player(&uid("bob")).unwrap().its_your_turn);
        assert!(meta.player(&uid("alice")).unwrap().its_your_turn);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.peek().unwrap().fires_at, 10_000);
    }

    #[test]
    fn test_bots_get_no_expiration_entries() {
        let (mut meta, mut sched) = setup();

        apply_begin(&mut meta, &mut sched, &uid("bot-1"), &timed(10_000), 0);

        let bot = meta.player(&uid("bot-1")).unwrap();
        assert!(bot.its_your_turn);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_deadline_without_default_move_ends_turn() {
        let (mut meta, mut sched) = setup();

        let begin = BeginTurn {
            expires_at: Some(5000),
            on_expiration: None,
        };
        apply_begin(&mut meta, &mut sched, &uid("alice"), &begin, 0);

        assert!(matches!(
            sched.peek().unwrap().action,
            ScheduledAction::EndTurn { .. }
        ));
    }

    #[test]
    fn test_unknown_user_is_ignored() {
        let (mut meta, mut sched) = setup();

        apply_begin(&mut meta, &mut sched, &uid("mallory"), &timed(5000), 0);

        assert!(sched.is_empty());
        assert!(meta.users_with_turn().is_empty());
    }

    #[test]
    fn test_host_facing_begin_for_all() {
        let (mut meta, mut sched) = setup();
        let roster = meta.user_ids();

        begin(
            &mut meta,
            &mut sched,
            &roster,
            &TurnOptions::open().expires_in(60_000),
            1000,
        );

        assert_eq!(meta.users_with_turn().len(), 3);
        // Two humans scheduled, the bot exempt
        assert_eq!(sched.len(), 2);
        assert_eq!(sched.peek().unwrap().fires_at, 61_000);
    }
}

//! Delayed-move scheduling.
//!
//! The scheduler is a time-ordered queue of pending actions. Ordering is by
//! `fires_at` ascending with ties broken by insertion order (stable), so two
//! moves scheduled for the same instant fire in the order they were
//! requested. The queue itself knows nothing about execution - the harness
//! (or a real-time host mapping entries to timers) pops due entries and
//! fires them.
//!
//! Expiration-sourced entries are special only in one way: each user has at
//! most one outstanding expiration, and beginning or ending that user's turn
//! cancels it.

use serde::{Deserialize, Serialize};

use crate::core::{Ms, UserId};

/// Why an entry was scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleSource {
    /// A handler asked for a delayed move explicitly.
    Explicit,
    /// The turn controller scheduled a turn-expiration action.
    Expiration,
}

/// What fires when an entry comes due.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScheduledAction<PM, BM> {
    /// A player move executed on behalf of `user_id`.
    Player { user_id: UserId, mv: PM },
    /// A board move.
    Board { mv: BM },
    /// End `user_id`'s turn without running any handler - the expiration of
    /// a turn that declared a deadline but no default move.
    EndTurn { user_id: UserId },
}

impl<PM, BM> ScheduledAction<PM, BM> {
    /// The user this action targets, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            ScheduledAction::Player { user_id, .. } | ScheduledAction::EndTurn { user_id } => {
                Some(user_id)
            }
            ScheduledAction::Board { .. } => None,
        }
    }
}

/// One pending entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scheduled<PM, BM> {
    /// Absolute timestamp the entry fires at.
    pub fires_at: Ms,

    /// The action to fire.
    pub action: ScheduledAction<PM, BM>,

    /// Explicit delay or turn expiration.
    pub source: ScheduleSource,
}

/// Time-ordered queue of pending delayed moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scheduler<PM, BM> {
    queue: Vec<Scheduled<PM, BM>>,
}

impl<PM, BM> Default for Scheduler<PM, BM> {
    fn default() -> Self {
        Self { queue: Vec::new() }
    }
}

impl<PM, BM> Scheduler<PM, BM> {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether anything is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Insert an entry, keeping the queue sorted by `fires_at` with stable
    /// tie order (new entries go after existing equal timestamps).
    pub fn schedule(&mut self, entry: Scheduled<PM, BM>) {
        let pos = self
            .queue
            .partition_point(|e| e.fires_at <= entry.fires_at);
        self.queue.insert(pos, entry);
    }

    /// The earliest pending entry.
    #[must_use]
    pub fn peek(&self) -> Option<&Scheduled<PM, BM>> {
        self.queue.first()
    }

    /// Pop the earliest entry if it fires at or before `until`.
    pub fn pop_due(&mut self, until: Ms) -> Option<Scheduled<PM, BM>> {
        if self.queue.first()?.fires_at <= until {
            Some(self.queue.remove(0))
        } else {
            None
        }
    }

    /// Cancel the outstanding expiration entry for a user, if any.
    ///
    /// Called whenever that user's turn begins (superseding) or ends.
    /// Explicitly delayed moves are untouched.
    pub fn cancel_expirations_for(&mut self, user_id: &UserId) {
        self.queue.retain(|e| {
            e.source != ScheduleSource::Expiration || e.action.user_id() != Some(user_id)
        });
    }

    /// Drop every pending entry (match end).
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Pending entries in firing order, for persistence.
    pub fn entries(&self) -> impl Iterator<Item = &Scheduled<PM, BM>> {
        self.queue.iter()
    }

    /// Rebuild from persisted entries (assumed already sorted; re-sorted
    /// defensively since the order is an invariant here).
    #[must_use]
    pub fn from_entries(mut entries: Vec<Scheduled<PM, BM>>) -> Self {
        entries.sort_by_key(|e| e.fires_at);
        Self { queue: entries }
    }
}

//! Deterministic, pluggable random number generation.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same seed produces identical sequence
//! - **Pluggable**: Handlers see `&mut dyn RandomSource`, so a scripted mock
//!   can stand in for the real generator in tests
//! - **Serializable**: O(1) state capture and restore for match snapshots
//!
//! ## Replay contract
//!
//! A match replayed from the same seed with the same move sequence draws the
//! same random stream and therefore reaches the same state. The harness
//! checkpoints the generator inside its snapshot for this reason.
//!
//! ```
//! use turnkit::core::{RandomExt, SeededRandom};
//!
//! let mut rng = SeededRandom::new(42);
//! let mut replay = SeededRandom::new(42);
//! assert_eq!(rng.roll(6), replay.roll(6));
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Source of uniform randomness for move execution.
///
/// Object-safe: the engine passes `&mut dyn RandomSource` into handlers.
/// Everything game code actually wants (dice, bernoulli draws, shuffles,
/// sampling) is built on these two primitives by [`RandomExt`].
pub trait RandomSource {
    /// Uniform integer in `[0, upper)`. `upper` must be non-zero.
    fn next_below(&mut self, upper: u64) -> u64;

    /// Uniform float in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// Convenience draws built on top of any [`RandomSource`].
pub trait RandomExt: RandomSource {
    /// Roll an n-sided die, returning a value in `[1, sides]`.
    fn roll(&mut self, sides: u32) -> u32 {
        self.next_below(u64::from(sides)) as u32 + 1
    }

    /// Roll a standard six-sided die.
    fn d6(&mut self) -> u32 {
        self.roll(6)
    }

    /// Uniform integer in the given half-open range.
    fn gen_range(&mut self, range: std::ops::Range<i64>) -> i64 {
        let span = (range.end - range.start) as u64;
        range.start + self.next_below(span) as i64
    }

    /// Bernoulli draw with the given probability of `true`.
    fn gen_bool(&mut self, probability: f64) -> bool {
        self.next_unit() < probability
    }

    /// Shuffle a slice in place (Fisher-Yates).
    fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_below(i as u64 + 1) as usize;
            slice.swap(i, j);
        }
    }

    /// Choose a random element from a slice.
    fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let i = self.next_below(slice.len() as u64) as usize;
            Some(&slice[i])
        }
    }
}

impl<R: RandomSource + ?Sized> RandomExt for R {}

/// Deterministic RNG backed by ChaCha8.
///
/// Fast, cryptographic-quality, and checkpointable in O(1) via the stream
/// word position regardless of how many values have been drawn.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    inner: ChaCha8Rng,
    seed: u64,
}

impl SeededRandom {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Get the current state for serialization.
    #[must_use]
    pub fn state(&self) -> SeededRandomState {
        SeededRandomState {
            seed: self.seed,
            word_pos: self.inner.get_word_pos(),
        }
    }

    /// Restore from a saved state.
    #[must_use]
    pub fn from_state(state: &SeededRandomState) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(state.seed);
        inner.set_word_pos(state.word_pos);
        Self {
            inner,
            seed: state.seed,
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_below(&mut self, upper: u64) -> u64 {
        self.inner.gen_range(0..upper)
    }

    fn next_unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }
}

/// Serializable RNG state for checkpointing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandomState {
    /// Original seed
    pub seed: u64,
    /// ChaCha8 word position (128-bit counter)
    pub word_pos: u128,
}

/// Scripted random source for deterministic tests.
///
/// Yields a pre-programmed sequence: integer draws are consumed verbatim
/// (reduced modulo the requested bound), unit draws come from a separate
/// float queue. An exhausted queue yields zero, so a test that under-programs
/// its draws stays deterministic instead of panicking mid-move.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandom {
    draws: VecDeque<u64>,
    unit_draws: VecDeque<f64>,
}

impl ScriptedRandom {
    /// Create a scripted source from a sequence of integer draws.
    #[must_use]
    pub fn new(draws: impl IntoIterator<Item = u64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            unit_draws: VecDeque::new(),
        }
    }

    /// Program die rolls directly: each entry is the face the next
    /// `roll(sides)` call should land on.
    #[must_use]
    pub fn of_rolls(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self::new(rolls.into_iter().map(|r| u64::from(r.saturating_sub(1))))
    }

    /// Add unit-interval draws for `next_unit`/`gen_bool`.
    #[must_use]
    pub fn with_units(mut self, units: impl IntoIterator<Item = f64>) -> Self {
        self.unit_draws = units.into_iter().collect();
        self
    }

    /// Number of unconsumed integer draws.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn next_below(&mut self, upper: u64) -> u64 {
        self.draws.pop_front().map_or(0, |v| v % upper)
    }

    fn next_unit(&mut self) -> f64 {
        self.unit_draws.pop_front().unwrap_or(0.0)
    }
}

//! Deterministic, phase-indexed randomness.
//!
//! Every random draw in a game comes from the one seed recorded at
//! setup. Each phase transition runs on its own ChaCha stream (setup
//! is stream 0, N0 is stream 1, D1 is stream 2, N1 is stream 3, and
//! so on), so re-running a phase with the same inputs reproduces the
//! same flips and the same surviving worlds bit for bit. That
//! reproducibility is a correctness requirement, not an optimization:
//! a moderator must be able to rebuild any past state.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::phase::PhaseId;

/// The seeded random source threaded through one phase transition.
#[derive(Debug, Clone)]
pub struct PhaseRng {
    rng: ChaCha8Rng,
}

impl PhaseRng {
    /// Creates the source for one phase of a game.
    #[must_use]
    pub fn for_phase(seed: u64, phase: PhaseId) -> Self {
        Self::on_stream(seed, phase.stream())
    }

    /// Creates the source used by game setup (stream 0, reserved;
    /// phases start at stream 1).
    #[must_use]
    pub fn for_setup(seed: u64) -> Self {
        Self::on_stream(seed, 0)
    }

    fn on_stream(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self { rng }
    }

    /// Draws one element uniformly. Returns `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Draws a uniform index below `len`. Returns `None` for zero.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }

    /// Shuffles a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

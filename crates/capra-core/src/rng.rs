//! Deterministic RNG wrappers.
//!
//! # Determinism strategy
//!
//! Every stochastic subsystem (temporal drift, observation masking, RL
//! ε-greedy, engram ids) draws from a `SmallRng` seeded from the run's
//! master seed — there is no process-global random state.  Derived seeds
//! mix in an offset via the 64-bit fractional part of the golden ratio,
//! which spreads consecutive offsets uniformly across the seed space:
//!
//!   child_seed = parent_seed XOR (offset * MIXING_CONSTANT)
//!
//! Observation masking has a stricter contract: the mask RNG is rebuilt
//! from `(obs_mask_seed, step_index)` every tick, so replaying the same
//! step reference reproduces the same drops regardless of run history.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

// ── RunRng ────────────────────────────────────────────────────────────────────

/// Run-level deterministic RNG.
///
/// Owned by the runtime context; subsystems that need their own stream take
/// a [`child`](Self::child) seeded from this one.
#[derive(Debug)]
pub struct RunRng(SmallRng);

impl RunRng {
    pub fn new(seed: u64) -> Self {
        RunRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `RunRng` with a different seed offset — useful for
    /// giving each subsystem an independent deterministic stream.
    pub fn child(&mut self, offset: u64) -> RunRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        RunRng(SmallRng::seed_from_u64(child_seed))
    }

    /// Expose the inner `SmallRng` for use with `rand` distribution types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Choose a random element from a slice; `None` if the slice is empty.
    #[inline]
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.0)
    }
}

impl RngCore for RunRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

// ── Mask RNG derivation ───────────────────────────────────────────────────────

/// Build the observation-mask RNG for one step.
///
/// Seeded from `(mask_seed, step_index)` so identical step references yield
/// identical drop decisions, independent of anything else the run has drawn.
pub fn mask_rng(mask_seed: u64, step_index: u64) -> SmallRng {
    SmallRng::seed_from_u64(mask_seed ^ step_index.wrapping_mul(MIXING_CONSTANT))
}

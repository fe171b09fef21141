//! Deterministic random number generation.
//!
//! RULE: Nothing in the pipeline may call any platform RNG.
//! All randomness flows through StageRng instances derived
//! from the single seed in PipelineConfig.
//!
//! Each stage gets its own RNG stream, seeded deterministically
//! from (seed XOR slot * golden-ratio constant). This means:
//!   - Adding a new random stage never changes existing stages' streams.
//!   - Each stage's draw is fully reproducible in isolation.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// Source of uniform indices. The sampler and splitter only see this
/// trait, so tests can hand them a scripted stand-in.
pub trait IndexSource {
    /// Return an index in [0, n). Callers guarantee n > 0.
    fn next_index_below(&mut self, n: usize) -> usize;
}

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// Create a stage RNG from the run seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(seed: u64, slot_index: u64) -> Self {
        let derived_seed = seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a u64 in [0, n) without modulo bias.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::Rng;
        assert!(n > 0, "n must be > 0");
        self.inner.gen_range(0..n)
    }
}

impl IndexSource for StageRng {
    fn next_index_below(&mut self, n: usize) -> usize {
        self.next_u64_below(n as u64) as usize
    }
}

/// All stage RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    seed: u64,
}

impl RngBank {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        StageRng::new(self.seed, slot as u64).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries, only append.
/// Reordering changes every stage's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    NegativeSampling = 0,
    HoldoutSplit = 1,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NegativeSampling => "negative_sampling",
            Self::HoldoutSplit => "holdout_split",
        }
    }
}

//! Shared geometric height sampler
//!
//! Every structure in this crate except [`crate::lock_free_list`] draws
//! a per-node height by flipping a biased coin with success probability
//! `p`, counting successes until the first failure, and clamping to
//! `Hmax`. This module is the one place that sampling logic lives.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skipset_core::HeightConfig;

/// Per-structure height sampler
///
/// Holds its own RNG state behind a mutex so height sampling is usable
/// from both the single-threaded structures and the lock-free one
/// without requiring `&mut self` at the call site.
pub struct HeightSampler {
    config: HeightConfig,
    rng: Mutex<StdRng>,
}

impl HeightSampler {
    /// Creates a sampler seeded from the process entropy source
    ///
    /// Each instance seeds independently so that heights drawn by
    /// distinct structures in the same process are not correlated.
    pub fn new(config: HeightConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// The configuration this sampler was built from
    pub fn config(&self) -> HeightConfig {
        self.config
    }

    /// Draws a new height in `[1, Hmax]`
    pub fn sample(&self) -> usize {
        let mut height = 1usize;
        let mut rng = self.rng.lock();
        while height < self.config.max_height() && rng.gen_bool(self.config.p()) {
            height += 1;
        }
        height
    }
}

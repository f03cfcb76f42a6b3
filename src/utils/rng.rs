//! Explicit, seedable random state.
//!
//! Every consumer of randomness (weight initialisation, dropout masks, the
//! epoch shuffle) receives a [`SeededRng`] it owns or borrows; there is no
//! process-global generator, so tests can inject fixed seeds.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seedable random number generator backed by `rand`'s `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRng {
    inner: StdRng,
}

impl SeededRng {
    /// Create a generator from an explicit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a generator seeded from the wall clock.
    pub fn from_time() -> Self {
        Self::new(time_seed())
    }

    /// Reseed based on the current time.
    pub fn reseed_from_time(&mut self) {
        self.inner = StdRng::seed_from_u64(time_seed());
    }

    /// Uniform sample in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform sample in [low, high). Returns `low` for an empty range.
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.inner.gen_range(low..high)
    }

    /// Sample from a zero-mean normal distribution with the given spread.
    pub fn gen_normal(&mut self, std_dev: f64) -> f64 {
        match Normal::new(0.0, std_dev.abs()) {
            Ok(normal) => normal.sample(&mut self.inner),
            Err(_) => 0.0,
        }
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            self.inner.gen_range(0..upper)
        }
    }

    /// Shuffle a slice of indices in place.
    pub fn shuffle_usize(&mut self, data: &mut [usize]) {
        data.shuffle(&mut self.inner);
    }

    /// A random permutation of `0..len`.
    pub fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        self.shuffle_usize(&mut order);
        order
    }

    /// Derive an independent generator, advancing this one.
    pub fn fork(&mut self) -> SeededRng {
        SeededRng::new(self.inner.gen::<u64>())
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

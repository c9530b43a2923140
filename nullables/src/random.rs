//! Nullable random — reproducible draws for the weighted resolver.

use crate::locked;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use veriflow_flow::RandomSource;
use veriflow_types::FlowParams;

/// A seeded RNG: statistically random, identical on every run.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_bps(&self) -> u32 {
        locked(&self.rng).gen_range(0..FlowParams::FULL_BPS)
    }
}

/// Returns pre-configured draws in order, cycling when exhausted.
pub struct ScriptedRandom {
    draws: Vec<u32>,
    index: Mutex<usize>,
}

impl ScriptedRandom {
    /// Create with a sequence of draws in basis points. An empty script
    /// always draws zero.
    pub fn new(draws: Vec<u32>) -> Self {
        Self {
            draws,
            index: Mutex::new(0),
        }
    }

    /// Create with a single draw that will be returned for every call.
    pub fn constant(draw: u32) -> Self {
        Self::new(vec![draw])
    }
}

impl RandomSource for ScriptedRandom {
    fn next_bps(&self) -> u32 {
        if self.draws.is_empty() {
            return 0;
        }
        let mut idx = locked(&self.index);
        let draw = self.draws[*idx % self.draws.len()];
        *idx += 1;
        draw.min(FlowParams::FULL_BPS - 1)
    }
}

// ============================================================
// Layer 4 — Batch Sampler
// ============================================================
// Decides which examples go into which mini-batch.
//
//   Training split: reshuffled every epoch
//   Test split:     file order, never shuffled
//
// The shuffle RNG is seeded with `seed + epoch` so a run is
// reproducible while every epoch still sees a new order.
// The final batch of an epoch may be smaller than batch_size.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

#[derive(Debug, Clone)]
pub struct BatchSampler {
    len:        usize,
    batch_size: usize,
    /// Base seed; `None` keeps the split in order.
    shuffle:    Option<u64>,
}

impl BatchSampler {
    /// In-order sampler for evaluation.
    pub fn sequential(len: usize, batch_size: usize) -> Result<Self> {
        Self::build(len, batch_size, None)
    }

    /// Per-epoch shuffling sampler for training.
    pub fn shuffled(len: usize, batch_size: usize, seed: u64) -> Result<Self> {
        Self::build(len, batch_size, Some(seed))
    }

    fn build(len: usize, batch_size: usize, shuffle: Option<u64>) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be at least 1");
        Ok(Self { len, batch_size, shuffle })
    }

    /// Number of batches in one epoch, counting a short final batch.
    pub fn num_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Example indices for every batch of the given epoch.
    pub fn epoch_batches(&self, epoch: usize) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len).collect();
        if let Some(seed) = self.shuffle {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }
        order.chunks(self.batch_size).map(<[usize]>::to_vec).collect()
    }
}

//! Seedable RNG for the Prompt Builder's legal-move sampling (spec §9:
//! "Randomness... a seedable RNG; tests inject a deterministic seed").

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Wraps a `ChaCha8Rng` so callers don't need to depend on `rand_chacha`
/// directly; cloneable so a Game Driver can fork a stream per game from a
/// master seed.
#[derive(Clone)]
pub struct SampleRng(ChaCha8Rng);

impl SampleRng {
    pub fn from_seed(seed: u64) -> Self {
        SampleRng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        SampleRng(ChaCha8Rng::from_entropy())
    }

    /// Inclusive-exclusive range sample, clamped so `low >= high` degenerates
    /// to `low` rather than panicking.
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        self.0.gen_range(low..high)
    }

    /// Fisher-Yates partial shuffle: take `count` distinct elements from
    /// `items` in random order (used to sample the STATE section's legal
    /// move list without biasing toward generation order).
    pub fn sample_distinct<T: Clone>(&mut self, items: &[T], count: usize) -> Vec<T> {
        let mut pool: Vec<T> = items.to_vec();
        let take = count.min(pool.len());
        let mut out = Vec::with_capacity(take);
        for i in 0..take {
            let remaining = pool.len() - i;
            let j = i + self.gen_range_usize(0, remaining);
            pool.swap(i, j);
            out.push(pool[i].clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_sample() {
        let items: Vec<u32> = (0..20).collect();
        let mut a = SampleRng::from_seed(42);
        let mut b = SampleRng::from_seed(42);
        assert_eq!(a.sample_distinct(&items, 5), b.sample_distinct(&items, 5));
    }

    #[test]
    fn sample_never_exceeds_pool_size() {
        let items = vec!["e4", "d4"];
        let mut rng = SampleRng::from_seed(7);
        assert_eq!(rng.sample_distinct(&items, 10).len(), 2);
    }
}

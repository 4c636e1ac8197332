use rand::{SeedableRng, rngs::StdRng, seq::index};

/// Chooses the clients taking part in each round.
///
/// With a fraction of 1 every client is picked in index order, otherwise a seeded random subset
/// of `ceil(fraction * n)` clients is drawn for each round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSelector {
    fraction: f64,
    seed: u64,
}

impl ClientSelector {
    pub fn new(fraction: f64, seed: u64) -> Self {
        Self { fraction, seed }
    }

    /// Returns the indices of the clients selected for `round` out of `n`, sorted.
    pub fn select(&self, round: usize, n: usize) -> Vec<usize> {
        if self.fraction >= 1. || n == 0 {
            return (0..n).collect();
        }

        let amount = ((self.fraction * n as f64).ceil() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(self.seed ^ (round as u64).wrapping_mul(0x2545_F491));

        let mut selected = index::sample(&mut rng, n, amount).into_vec();
        selected.sort_unstable();
        selected
    }
}

use std::sync::Arc;

use machine_learning::WeightSet;

/// The authoritative weights of a run and the amount of rounds committed into them.
///
/// Readers hold an `Arc` snapshot, a commit swaps in a whole new value so no one ever sees a
/// partially updated model.
#[derive(Debug, Clone)]
pub struct GlobalModel {
    version: usize,
    weights: Arc<WeightSet>,
}

impl GlobalModel {
    pub fn new(weights: WeightSet) -> Self {
        Self {
            version: 0,
            weights: Arc::new(weights),
        }
    }

    /// The amount of rounds committed so far.
    pub fn version(&self) -> usize {
        self.version
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    /// Returns a cheap shared handle to the current weights.
    pub fn snapshot(&self) -> Arc<WeightSet> {
        Arc::clone(&self.weights)
    }

    pub(crate) fn commit(&mut self, weights: WeightSet) {
        self.weights = Arc::new(weights);
        self.version += 1;
    }

    pub(crate) fn replace(&mut self, weights: WeightSet) {
        self.weights = Arc::new(weights);
    }
}

use std::num::NonZeroUsize;

use machine_learning::specs::{LossFnSpec, OptimizerSpec};
use serde::{Deserialize, Serialize};

/// The local training setup shared by every client of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub batch_size: NonZeroUsize,
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    pub seed: u64,
}

impl ClientConfig {
    /// Creates a new `ClientConfig` with the default optimizer, Adam with a learning rate
    /// of 0.001.
    ///
    /// # Arguments
    /// * `batch_size` - The maximum amount of samples per batch.
    /// * `loss` - The loss minimized during local training.
    /// * `seed` - The base seed every client derives its shuffling from.
    pub fn new(batch_size: NonZeroUsize, loss: LossFnSpec, seed: u64) -> Self {
        Self {
            batch_size,
            optimizer: OptimizerSpec::default(),
            loss,
            seed,
        }
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerSpec) -> Self {
        self.optimizer = optimizer;
        self
    }
}

use std::time::Instant;

use compression::WeightCodec;
use log::{debug, info};
use machine_learning::{
    WeightSet,
    arch::{Model, ModelFactory},
    dataset::Dataset,
    training::ModelTrainer,
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{ClientConfig, ClientErr, ClientUpdate, Result, UpdatePayload, lease::ModelLease};

/// What a local training run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutcome {
    pub weights: WeightSet,
    pub losses: Vec<f32>,
}

/// A federated client: owns a private dataset and, only while a round lasts, a local model.
pub struct Client {
    index: usize,
    config: ClientConfig,
    dataset: Option<Dataset>,
    model: Option<Box<dyn Model>>,
    trainer: Option<ModelTrainer>,
    rng: StdRng,
}

impl Client {
    /// Creates a new `Client` with no data nor model.
    ///
    /// # Arguments
    /// * `index` - The identifier of the client within the pool.
    /// * `config` - The local training setup.
    pub fn new(index: usize, config: ClientConfig) -> Self {
        Self {
            index,
            config,
            dataset: None,
            model: None,
            trainer: None,
            rng: StdRng::seed_from_u64(round_seed(config.seed, index, 0)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The amount of local samples, zero until data is set.
    pub fn samples(&self) -> usize {
        self.dataset.as_ref().map_or(0, Dataset::len)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Associates a private dataset with the client.
    ///
    /// # Arguments
    /// * `x` - The features, one sample per row.
    /// * `y` - The labels, one sample per row.
    ///
    /// # Returns
    /// A data error if the amount of rows differ or there are none.
    pub fn set_local_data(&mut self, x: Array2<f32>, y: Array2<f32>) -> Result<()> {
        let dataset = Dataset::new(x, y).map_err(|source| ClientErr::Data {
            client: self.index,
            source,
        })?;

        self.set_dataset(dataset);
        Ok(())
    }

    pub fn set_dataset(&mut self, dataset: Dataset) {
        debug!(client = self.index, samples = dataset.len(); "received local data");
        self.dataset = Some(dataset);
    }

    /// Instantiates a local model and loads `weights` into it, the optimizer starts afresh.
    ///
    /// # Returns
    /// A shape mismatch error if `weights` doesn't fit the factory's architecture.
    pub fn init_model(&mut self, factory: &dyn ModelFactory, weights: &WeightSet) -> Result<()> {
        let mut model = factory.build();
        model
            .load_weights(weights)
            .map_err(|source| ClientErr::ShapeMismatch {
                client: self.index,
                source,
            })?;

        let trainer = ModelTrainer::new(
            self.config.optimizer.build(),
            self.config.loss.build(),
            self.config.batch_size,
        );

        self.model = Some(model);
        self.trainer = Some(trainer);
        Ok(())
    }

    /// Runs `epochs` passes of mini-batch training over the local data.
    ///
    /// # Returns
    /// The resulting local weights and the loss of every batch, or `NumericDivergence` if a
    /// loss stops being finite. The local samples keep their order.
    pub fn local_train(&mut self, epochs: usize) -> Result<LocalOutcome> {
        let client = self.index;
        let dataset = self.dataset.as_ref().ok_or(ClientErr::NoData { client })?;
        let (Some(model), Some(trainer)) = (self.model.as_mut(), self.trainer.as_mut()) else {
            return Err(ClientErr::NoModel { client });
        };

        let losses = trainer
            .train(model.as_mut(), dataset, epochs, &mut self.rng)
            .map_err(|e| ClientErr::training(client, e))?;

        Ok(LocalOutcome {
            weights: model.weights(),
            losses,
        })
    }

    /// Releases the local model and its optimizer state, the dataset is kept.
    pub fn reset(&mut self) {
        self.model = None;
        self.trainer = None;
    }

    /// Runs a whole round: loads the global weights, trains and optionally encodes the result.
    ///
    /// The local model only lives while this call lasts, it is released on every exit path.
    ///
    /// # Arguments
    /// * `round` - The round index, mixed into the shuffling seed.
    /// * `factory` - Builds the local model.
    /// * `global` - The global weights of the round.
    /// * `epochs` - The amount of local epochs.
    /// * `codec` - Compresses the resulting weights when present.
    pub fn train_round(
        &mut self,
        round: usize,
        factory: &dyn ModelFactory,
        global: &WeightSet,
        epochs: usize,
        codec: Option<&WeightCodec>,
    ) -> Result<ClientUpdate> {
        let client = self.index;
        self.rng = StdRng::seed_from_u64(round_seed(self.config.seed, client, round));

        let start = Instant::now();
        let mut lease = ModelLease::new(self, round);
        lease.init_model(factory, global)?;
        let LocalOutcome { weights, losses } = lease.local_train(epochs)?;
        let samples = lease.samples();
        drop(lease);

        let mean = losses.iter().sum::<f32>() / losses.len().max(1) as f32;
        info!(
            client = client, round = round, epochs = epochs, loss = mean,
            secs = start.elapsed().as_secs_f64();
            "local training finished"
        );

        let payload = match codec {
            Some(codec) => {
                let encoded = codec
                    .encode(&weights)
                    .map_err(|source| ClientErr::Codec { client, source })?;
                UpdatePayload::Encoded(encoded)
            }
            None => UpdatePayload::Raw(weights),
        };

        debug!(client = client, round = round, bits = payload.payload_bits(); "update ready");

        Ok(ClientUpdate {
            client,
            round,
            samples,
            payload,
            losses,
        })
    }
}

/// Derives the shuffling seed of a client for a round.
fn round_seed(seed: u64, client: usize, round: usize) -> u64 {
    seed ^ (client as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (round as u64).rotate_left(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_differ_per_client_and_round() {
        let seeds = [
            round_seed(7, 0, 0),
            round_seed(7, 1, 0),
            round_seed(7, 0, 1),
            round_seed(7, 1, 1),
        ];

        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}

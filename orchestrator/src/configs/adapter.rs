use std::{sync::Arc, time::Duration};

use client::{Client, ClientConfig};
use log::info;
use machine_learning::{
    WeightSet,
    arch::{ModelFactory, SequentialFactory},
    dataset::Dataset,
    evaluation::HoldoutEvaluator,
};
use rand::{SeedableRng, rngs::StdRng};
use server::{ClientPool, DpConfig, FederationConfig};

use super::{AggregatorConfig, RunConfig};
use crate::{data, error::OrchestratorError};

/// Everything a run needs, built out of a validated `RunConfig`.
pub struct Federation {
    pub factory: Arc<SequentialFactory>,
    pub initial_weights: WeightSet,
    pub config: FederationConfig,
    pub pool: ClientPool,
    pub evaluator: Option<HoldoutEvaluator>,
}

pub struct Adapter;

impl Adapter {
    pub fn new() -> Self {
        Self
    }

    /// Validates `run` and turns it into the components of a federation.
    ///
    /// # Arguments
    /// * `run` - The run configuration.
    /// * `dataset` - The whole dataset, to be shuffled, split and sharded among the clients.
    pub fn adapt_configs(
        &self,
        run: &RunConfig,
        dataset: Dataset,
    ) -> Result<Federation, OrchestratorError> {
        self.validate(run)?;

        let fed = &run.fed_config;
        let factory = fed
            .model
            .factory(fed.seed)
            .map_err(|e| OrchestratorError::InvalidConfig(format!("model: {e}")))?;
        let initial_weights = factory
            .initial_weights()
            .map_err(|e| OrchestratorError::InvalidConfig(format!("model: {e}")))?;
        let factory = Arc::new(factory);

        let mut rng = StdRng::seed_from_u64(fed.seed);
        let (train, held) = data::holdout(dataset, run.data_config.holdout_fraction, &mut rng)?;
        let shards = data::partition(&train, fed.num_clients.get())?;
        info!(
            train = train.len(), held_out = held.as_ref().map_or(0, Dataset::len),
            clients = shards.len();
            "partitioned dataset"
        );

        let evaluator = held.map(|held| {
            HoldoutEvaluator::new(factory.clone(), fed.loss.build(), held)
        });

        Ok(Federation {
            initial_weights,
            config: self.adapt_federation(run),
            pool: self.adapt_clients(run, shards),
            evaluator,
            factory,
        })
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate(&self, run: &RunConfig) -> Result<(), OrchestratorError> {
        if run.global_config.name.trim().is_empty() {
            return Err(OrchestratorError::InvalidConfig(
                "the run must have a name".into(),
            ));
        }

        if run.global_config.dp_mode && run.dp_config.is_none() {
            return Err(OrchestratorError::InvalidConfig(
                "dp_mode is on but there is no dp_config".into(),
            ));
        }

        let data = &run.data_config;
        if !(0. ..1.).contains(&data.holdout_fraction) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "holdout_fraction ({}) must be within [0, 1)",
                data.holdout_fraction
            )));
        }

        // The model must take the dataset's features and produce its labels
        let fed = &run.fed_config;
        match fed.model.io_sizes() {
            Some(io) if io == (data.x_size, data.y_size) => {}
            Some((input, output)) => {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "the model maps {input} features to {output} outputs but the dataset has \
                     {} features and {} labels",
                    data.x_size, data.y_size
                )));
            }
            None => {
                return Err(OrchestratorError::InvalidConfig(
                    "model must have at least one layer".into(),
                ));
            }
        }

        if let AggregatorConfig::TrimmedMean { trim } = fed.aggregator
            && !(0. ..0.5).contains(&trim)
        {
            return Err(OrchestratorError::InvalidConfig(format!(
                "trim ({trim}) must be within [0, 0.5)"
            )));
        }

        if let Some(timeout) = fed.round_timeout_secs
            && !(timeout.is_finite() && timeout > 0.)
        {
            return Err(OrchestratorError::InvalidConfig(format!(
                "round_timeout_secs ({timeout}) must be positive"
            )));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Adaptation
    // -------------------------------------------------------------------------

    fn adapt_federation(&self, run: &RunConfig) -> FederationConfig {
        let fed = &run.fed_config;
        let mut config = FederationConfig::new(fed.global_epochs, fed.local_epochs)
            .with_client_fraction(fed.client_fraction)
            .with_seed(fed.seed);

        if let Some(timeout) = fed.round_timeout_secs {
            config = config.with_round_timeout(Duration::from_secs_f64(timeout));
        }

        if let Some(bit_depth) = run.global_config.compress_digit {
            config = config.with_bit_depth(bit_depth);
        }

        if let (true, Some(dp)) = (run.global_config.dp_mode, run.dp_config) {
            config = config.with_dp(DpConfig {
                target_epsilon: dp.epsilon,
                target_delta: dp.delta,
                clip_norm: dp.clip_norm,
            });
        }

        config
    }

    fn adapt_clients(&self, run: &RunConfig, shards: Vec<Dataset>) -> ClientPool {
        let fed = &run.fed_config;
        let config =
            ClientConfig::new(fed.batch_size, fed.loss, fed.seed).with_optimizer(fed.optimizer);

        ClientPool::new(shards.into_iter().enumerate().map(|(i, shard)| {
            let mut client = Client::new(i, config);
            client.set_dataset(shard);
            client
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunConfig {
        let json = r#"{
            "global_config": { "name": "toy" },
            "data_config": {
                "dataset": { "inline": { "data": [0, 1, 1, 3, 2, 5, 3, 7, 4, 9, 5, 11] } },
                "x_size": 1,
                "y_size": 1,
                "holdout_fraction": 0.34
            },
            "fed_config": {
                "batch_size": 2,
                "num_clients": 2,
                "global_epochs": 3,
                "local_epochs": 1,
                "loss": "mse",
                "model": {
                    "sequential": {
                        "layers": [{ "dense": { "dim": [1, 1], "act_fn": null } }],
                        "init": { "const": { "value": 0.0 } }
                    }
                }
            }
        }"#;

        serde_json::from_str(json).unwrap()
    }

    fn dataset(run: &RunConfig) -> Dataset {
        data::load(&run.data_config).unwrap()
    }

    #[test]
    fn builds_a_federation() {
        let run = run();
        let federation = Adapter::new().adapt_configs(&run, dataset(&run)).unwrap();

        assert_eq!(federation.pool.len(), 2);
        assert!(federation.evaluator.is_some());
        assert_eq!(federation.config.client_fraction, 1.);
        assert_eq!(federation.config.global_rounds.get(), 3);
        assert_eq!(federation.config.dp, None);
        assert_eq!(federation.initial_weights.num_params(), 2);

        let samples: usize = federation.pool.iter().map(|c| c.lock().samples()).sum();
        assert_eq!(samples, 4);
    }

    #[test]
    fn dp_mode_needs_settings() {
        let mut run = run();
        run.global_config.dp_mode = true;

        let result = Adapter::new().adapt_configs(&run, dataset(&run));
        assert!(matches!(result, Err(OrchestratorError::InvalidConfig(_))));
    }

    #[test]
    fn model_must_fit_the_data() {
        let mut run = run();
        run.data_config.x_size = 2;
        run.data_config.dataset = crate::configs::DatasetConfig::Inline {
            data: vec![0.; 9],
        };

        let dataset = data::load(&run.data_config).unwrap();
        let result = Adapter::new().adapt_configs(&run, dataset);
        assert!(matches!(result, Err(OrchestratorError::InvalidConfig(_))));
    }
}

use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
    sync::Arc,
};

use aggregation::{Aggregator, WeightedUpdate};
use client::{ClientUpdate, UpdatePayload};
use compression::WeightCodec;
use log::{debug, error, info, warn};
use machine_learning::{
    WeightSet,
    arch::ModelFactory,
    evaluation::{Evaluator, Metrics},
    weights::check_layout,
};
use privacy::{GaussianMechanism, PrivacyBudget, RdpAccountant};
use tokio::{task::JoinSet, time};

use crate::{
    ClientFailure, ClientPool, ClientSelector, FailureReason, FederationConfig, GlobalModel,
    History, Result, RoundRecord, ServerErr, persistence,
};

/// The outcome of a committed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: usize,
    /// The clients whose updates got aggregated, in index order.
    pub aggregated: Vec<usize>,
    pub failures: Vec<ClientFailure>,
    pub metrics: Option<Metrics>,
}

/// The round orchestrator: owns the global model and drives selection, local training,
/// privatization, aggregation and evaluation.
pub struct Server<A: Aggregator> {
    config: FederationConfig,
    factory: Arc<dyn ModelFactory>,
    aggregator: A,
    codec: Option<WeightCodec>,
    privacy: Option<(PrivacyBudget, GaussianMechanism)>,
    selector: ClientSelector,
    global: GlobalModel,
    evaluator: Option<Box<dyn Evaluator>>,
    history: History,
}

impl<A: Aggregator> Server<A> {
    /// Creates the global model of a run and validates its configuration.
    ///
    /// # Arguments
    /// * `factory` - Builds the models clients train.
    /// * `initial_weights` - The weights of the first round.
    /// * `aggregator` - The strategy merging the updates of each round.
    /// * `config` - The run configuration.
    ///
    /// # Returns
    /// `Config` if the weights don't fit the factory or the configuration is invalid,
    /// `Privacy` if the privacy target can't be met.
    pub fn initialize(
        factory: Arc<dyn ModelFactory>,
        initial_weights: WeightSet,
        aggregator: A,
        config: FederationConfig,
    ) -> Result<Self> {
        check_layout(&factory.architecture(), &initial_weights).map_err(|e| {
            ServerErr::Config(format!("initial weights don't fit the model: {e}"))
        })?;

        if !initial_weights.is_finite() {
            return Err(ServerErr::Config(
                "initial weights hold non finite values".into(),
            ));
        }

        let fraction = config.client_fraction;
        if !(fraction > 0. && fraction <= 1.) {
            return Err(ServerErr::Config(format!(
                "client fraction {fraction} is not within (0, 1]"
            )));
        }

        let codec = config
            .bit_depth
            .map(WeightCodec::new)
            .transpose()
            .map_err(|e| ServerErr::Config(e.to_string()))?;

        let privacy = match &config.dp {
            Some(dp) => {
                let budget = RdpAccountant::default().budget(
                    dp.target_epsilon,
                    dp.target_delta,
                    fraction,
                    config.global_rounds.get(),
                    dp.clip_norm,
                )?;
                info!(
                    sigma = budget.noise_multiplier, clip_norm = budget.clip_norm;
                    "calibrated differential privacy noise"
                );
                let mechanism = GaussianMechanism::new(&budget, config.seed)?;
                Some((budget, mechanism))
            }
            None => None,
        };

        Ok(Self {
            selector: ClientSelector::new(fraction, config.seed),
            config,
            factory,
            aggregator,
            codec,
            privacy,
            global: GlobalModel::new(initial_weights),
            evaluator: None,
            history: History::new(),
        })
    }

    /// Evaluates the global model after every round with `evaluator`.
    pub fn with_evaluator<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn global(&self) -> &GlobalModel {
        &self.global
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn privacy_budget(&self) -> Option<&PrivacyBudget> {
        self.privacy.as_ref().map(|(budget, _)| budget)
    }

    /// Runs every round of the configuration, stopping at the first failed one.
    pub async fn run(&mut self, pool: &ClientPool) -> Result<&History> {
        for round in 0..self.config.global_rounds.get() {
            if let Err(e) = self.run_round(round, pool).await {
                error!(round = round; "{e}");
                return Err(e);
            }
        }

        info!(rounds = self.global.version(); "run finished");
        Ok(&self.history)
    }

    /// Runs a single round.
    ///
    /// Selected clients train in parallel on blocking threads; the ones that fail, time out or
    /// are still busy from an earlier round are excluded. The rest are decoded, privatized and
    /// aggregated into the new global model, which is committed at once.
    ///
    /// # Returns
    /// `RoundFailure` if no client contributed an update, the global model is left untouched.
    pub async fn run_round(&mut self, round: usize, pool: &ClientPool) -> Result<RoundReport> {
        let selected = self.selector.select(round, pool.len());
        info!(round = round, clients = selected.len(); "round started");

        let (updates, mut failures) = self.collect(round, &selected, pool).await;
        let snapshot = self.global.snapshot();

        let mut weighted = Vec::with_capacity(updates.len());
        let mut client_losses = Vec::new();
        let mut payload_bits = 0;

        for update in updates {
            let client = update.client;
            payload_bits += update.payload.payload_bits();
            let loss = update.mean_loss();

            match self.prepare_update(update, &snapshot) {
                Ok(update) => {
                    client_losses.extend(loss);
                    weighted.push(update);
                }
                Err(reason) => failures.push(ClientFailure { client, reason }),
            }
        }

        for failure in &failures {
            warn!(client = failure.client, round = round; "excluded: {}", failure.reason);
        }

        if weighted.is_empty() {
            return Err(ServerErr::RoundFailure { round, failures });
        }

        let weights = self
            .aggregator
            .combine(&weighted)
            .map_err(|source| ServerErr::Aggregation { round, source })?;

        self.global.commit(weights);
        info!(
            round = round, aggregated = weighted.len(), strategy = self.aggregator.name();
            "committed global model"
        );

        let metrics = match &self.evaluator {
            Some(evaluator) => {
                let metrics = evaluator
                    .evaluate(self.global.weights())
                    .map_err(|source| ServerErr::Evaluation { round, source })?;
                info!(round = round, loss = metrics.loss; "evaluated global model");
                Some(metrics)
            }
            None => None,
        };

        let aggregated: Vec<usize> = weighted.iter().map(|u| u.client).collect();
        let train_loss = (!client_losses.is_empty())
            .then(|| client_losses.iter().sum::<f32>() / client_losses.len() as f32);

        self.history.record(
            round,
            RoundRecord {
                clients: aggregated.clone(),
                excluded: failures.len(),
                train_loss,
                metrics,
                payload_bits,
            },
        );

        Ok(RoundReport {
            round,
            aggregated,
            failures,
            metrics,
        })
    }

    /// Trains the selected clients and gathers whatever they return before the deadline.
    ///
    /// # Returns
    /// The updates sorted by client index and the clients that failed.
    async fn collect(
        &self,
        round: usize,
        selected: &[usize],
        pool: &ClientPool,
    ) -> (Vec<ClientUpdate>, Vec<ClientFailure>) {
        let deadline = self.config.round_timeout.map(|t| time::Instant::now() + t);
        let epochs = self.config.local_epochs.get();
        let snapshot = self.global.snapshot();

        let mut tasks = JoinSet::new();
        let mut clients = HashMap::with_capacity(selected.len());
        let mut failures = Vec::new();

        for &index in selected {
            let Some(handle) = pool.get(index).cloned() else {
                continue;
            };

            let factory = Arc::clone(&self.factory);
            let snapshot = Arc::clone(&snapshot);
            let codec = self.codec;

            let task = tasks.spawn_blocking(move || {
                let Some(mut client) = handle.try_lock() else {
                    return Err(FailureReason::Busy);
                };

                debug!(client = index, round = round; "training");
                client
                    .train_round(round, factory.as_ref(), &snapshot, epochs, codec.as_ref())
                    .map_err(FailureReason::Client)
            });
            clients.insert(task.id(), index);
        }

        let mut updates = Vec::new();
        let mut answered = BTreeSet::new();

        loop {
            let joined = match deadline {
                Some(deadline) => {
                    match time::timeout_at(deadline, tasks.join_next_with_id()).await {
                        Ok(joined) => joined,
                        Err(_) => break,
                    }
                }
                None => tasks.join_next_with_id().await,
            };

            let Some(joined) = joined else {
                break;
            };

            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => {
                    let reason = if e.is_panic() {
                        FailureReason::Panicked
                    } else {
                        FailureReason::Cancelled
                    };
                    (e.id(), Err(reason))
                }
            };

            let Some(&client) = clients.get(&id) else {
                continue;
            };
            answered.insert(client);

            match result {
                Ok(update) => updates.push(update),
                Err(reason) => failures.push(ClientFailure { client, reason }),
            }
        }

        // Blocking tasks can't be cancelled, stragglers keep their client locked until done.
        tasks.detach_all();

        let missing = clients.values().filter(|client| !answered.contains(*client));
        for &client in missing {
            failures.push(ClientFailure {
                client,
                reason: FailureReason::TimedOut,
            });
        }

        updates.sort_by_key(|update| update.client);
        failures.sort_by_key(|failure| failure.client);
        (updates, failures)
    }

    /// Turns a client update into raw weights ready to aggregate: decodes it, checks its
    /// layout and privatizes it when differential privacy is on.
    fn prepare_update(
        &mut self,
        update: ClientUpdate,
        snapshot: &WeightSet,
    ) -> std::result::Result<WeightedUpdate, FailureReason> {
        let ClientUpdate {
            client,
            samples,
            payload,
            ..
        } = update;

        let weights = match payload {
            UpdatePayload::Raw(weights) => weights,
            UpdatePayload::Encoded(encoded) => {
                let codec = match self.codec {
                    Some(codec) => codec,
                    None => WeightCodec::new(encoded.bit_depth()).map_err(FailureReason::Codec)?,
                };
                codec.decode(&encoded).map_err(FailureReason::Codec)?
            }
        };

        snapshot
            .check_compatible(&weights)
            .map_err(FailureReason::Shape)?;

        let weights = match &mut self.privacy {
            Some((_, mechanism)) => {
                let (weights, norm) = mechanism
                    .privatize(&weights, snapshot)
                    .map_err(FailureReason::Privacy)?;
                debug!(client = client, norm = norm; "privatized update");
                weights
            }
            None => weights,
        };

        Ok(WeightedUpdate::new(client, samples, weights))
    }

    /// Saves the global model losslessly.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save(self.global.weights(), path)?;
        Ok(())
    }

    /// Replaces the global model with the weights stored at `path`.
    ///
    /// # Returns
    /// `Config` if the stored weights don't fit the model, the current model is kept.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let weights = persistence::load(path)?;

        check_layout(&self.factory.architecture(), &weights)
            .map_err(|e| ServerErr::Config(format!("stored weights don't fit the model: {e}")))?;

        self.global.replace(weights);
        Ok(())
    }
}

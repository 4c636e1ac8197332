pub mod configs;
pub mod data;
pub mod error;
mod experiment;

use aggregation::{Aggregator, FedAvg, Median, TrimmedMean};
use log::info;
use server::Server;

pub use error::OrchestratorError;
pub use experiment::Experiment;

use crate::configs::{Adapter, AggregatorConfig, Federation, RunConfig};

/// Runs a whole federated training and stores its outcome in the experiment directory.
///
/// The history and the global weights are written even if a round halts the run, they
/// hold the last committed state.
///
/// # Errors
/// Returns an `OrchestratorError` if the configuration is invalid, the dataset can't be
/// loaded or the run halts.
pub async fn train(run: RunConfig) -> Result<Experiment, OrchestratorError> {
    info!("adapting configs");
    let dataset = data::load(&run.data_config)?;
    let federation = Adapter::new().adapt_configs(&run, dataset)?;
    let experiment = Experiment::create(&run)?;

    match run.fed_config.aggregator {
        AggregatorConfig::FedAvg => drive(federation, FedAvg, &experiment).await?,
        AggregatorConfig::Median => drive(federation, Median, &experiment).await?,
        AggregatorConfig::TrimmedMean { trim } => {
            let aggregator = TrimmedMean::new(trim)
                .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))?;
            drive(federation, aggregator, &experiment).await?
        }
    }

    Ok(experiment)
}

async fn drive<A: Aggregator>(
    federation: Federation,
    aggregator: A,
    experiment: &Experiment,
) -> Result<(), OrchestratorError> {
    let Federation {
        factory,
        initial_weights,
        config,
        pool,
        evaluator,
    } = federation;

    let mut server = Server::initialize(factory, initial_weights, aggregator, config)?;
    if let Some(evaluator) = evaluator {
        server = server.with_evaluator(evaluator);
    }

    let outcome = server.run(&pool).await.map(|_| ());

    experiment.write_history(server.history())?;
    server.save_weights(experiment.weights_path())?;
    info!(rounds = server.global().version(); "saved run outcome");

    Ok(outcome?)
}

use std::{num::NonZeroUsize, path::PathBuf};

use machine_learning::specs::{LossFnSpec, ModelSpec, OptimizerSpec};
use serde::{Deserialize, Serialize};

/// The whole run description, as read from the JSON configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub global_config: GlobalConfig,
    pub data_config: DataConfig,
    pub fed_config: FedConfig,
    #[serde(default)]
    pub dp_config: Option<DpSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub name: String,
    /// The bit depth client updates are compressed with, uncompressed when absent.
    #[serde(default)]
    pub compress_digit: Option<u8>,
    #[serde(default)]
    pub dp_mode: bool,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Rows of `x_size` features followed by `y_size` labels, flattened.
    Inline { data: Vec<f32> },
    /// A comma separated file with one sample per line.
    Csv {
        path: PathBuf,
        #[serde(default)]
        has_header: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub dataset: DatasetConfig,
    pub x_size: usize,
    pub y_size: usize,
    /// The fraction of samples kept aside to evaluate the global model.
    #[serde(default)]
    pub holdout_fraction: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorConfig {
    #[default]
    FedAvg,
    Median,
    TrimmedMean {
        trim: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FedConfig {
    pub batch_size: NonZeroUsize,
    pub num_clients: NonZeroUsize,
    pub global_epochs: NonZeroUsize,
    pub local_epochs: NonZeroUsize,
    #[serde(default = "default_fraction")]
    pub client_fraction: f64,
    #[serde(default)]
    pub round_timeout_secs: Option<f64>,
    #[serde(default)]
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    pub model: ModelSpec,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpSettings {
    pub epsilon: f64,
    pub delta: f64,
    pub clip_norm: f64,
}

fn default_output() -> PathBuf {
    PathBuf::from("runs")
}

fn default_fraction() -> f64 {
    1.
}

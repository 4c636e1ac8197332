mod adapter;
mod training;

pub use adapter::{Adapter, Federation};
pub use training::{
    AggregatorConfig, DataConfig, DatasetConfig, DpSettings, FedConfig, GlobalConfig, RunConfig,
};

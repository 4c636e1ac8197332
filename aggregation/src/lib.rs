mod aggregator;
mod error;
mod fed_avg;
mod median;
mod trimmed_mean;

pub use aggregator::{Aggregator, WeightedUpdate};
pub use error::{AggregationErr, Result};
pub use fed_avg::FedAvg;
pub use median::Median;
pub use trimmed_mean::TrimmedMean;

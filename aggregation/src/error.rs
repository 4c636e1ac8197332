use std::{
    error::Error,
    fmt::{self, Display},
};

use machine_learning::MlErr;

pub type Result<T> = std::result::Result<T, AggregationErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationErr {
    EmptyAggregation,
    ShapeMismatch { client: usize, source: MlErr },
    InvalidParameter(String),
}

impl Display for AggregationErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationErr::EmptyAggregation => {
                write!(f, "there are no updates with a positive sample count to aggregate")
            }
            AggregationErr::ShapeMismatch { client, source } => {
                write!(f, "the update of client {client} doesn't match the others: {source}")
            }
            AggregationErr::InvalidParameter(msg) => write!(f, "invalid aggregator parameter: {msg}"),
        }
    }
}

impl Error for AggregationErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AggregationErr::ShapeMismatch { source, .. } => Some(source),
            _ => None,
        }
    }
}

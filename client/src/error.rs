use std::{error::Error, fmt};

use compression::CodecErr;
use machine_learning::MlErr;

/// The client module's result type.
pub type Result<T> = std::result::Result<T, ClientErr>;

/// Local training failures, every one of them names the client it happened at.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientErr {
    NoData {
        client: usize,
    },
    NoModel {
        client: usize,
    },
    Data {
        client: usize,
        source: MlErr,
    },
    ShapeMismatch {
        client: usize,
        source: MlErr,
    },
    NumericDivergence {
        client: usize,
        epoch: usize,
        batch: usize,
        loss: f32,
    },
    Training {
        client: usize,
        source: MlErr,
    },
    Codec {
        client: usize,
        source: CodecErr,
    },
}

impl ClientErr {
    /// Wraps an error raised while training, telling divergence apart.
    pub(crate) fn training(client: usize, source: MlErr) -> Self {
        match source {
            MlErr::NumericDivergence { epoch, batch, loss } => ClientErr::NumericDivergence {
                client,
                epoch,
                batch,
                loss,
            },
            e if e.is_data_error() => ClientErr::Data { client, source: e },
            e => ClientErr::Training { client, source: e },
        }
    }
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErr::NoData { client } => write!(f, "client {client} has no local data"),
            ClientErr::NoModel { client } => {
                write!(f, "client {client} has no model, call init_model first")
            }
            ClientErr::Data { client, source } => {
                write!(f, "client {client} has a malformed dataset: {source}")
            }
            ClientErr::ShapeMismatch { client, source } => {
                write!(f, "client {client} received incompatible weights: {source}")
            }
            ClientErr::NumericDivergence {
                client,
                epoch,
                batch,
                loss,
            } => write!(
                f,
                "client {client} diverged at epoch {epoch}, batch {batch}: loss is {loss}"
            ),
            ClientErr::Training { client, source } => {
                write!(f, "client {client} failed to train: {source}")
            }
            ClientErr::Codec { client, source } => {
                write!(f, "client {client} failed to encode its update: {source}")
            }
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientErr::Data { source, .. }
            | ClientErr::ShapeMismatch { source, .. }
            | ClientErr::Training { source, .. } => Some(source),
            ClientErr::Codec { source, .. } => Some(source),
            _ => None,
        }
    }
}

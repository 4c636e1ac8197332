use std::{
    error::Error,
    fmt::{self, Display},
};

use aggregation::AggregationErr;
use client::ClientErr;
use compression::CodecErr;
use machine_learning::MlErr;
use privacy::PrivacyErr;

use crate::persistence::PersistErr;

/// The server module's result type.
pub type Result<T> = std::result::Result<T, ServerErr>;

/// Why a selected client contributed nothing to a round.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    TimedOut,
    Busy,
    Panicked,
    Cancelled,
    Client(ClientErr),
    Codec(CodecErr),
    Shape(MlErr),
    Privacy(PrivacyErr),
}

/// A client excluded from a round.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientFailure {
    pub client: usize,
    pub reason: FailureReason,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TimedOut => write!(f, "didn't answer before the round deadline"),
            FailureReason::Busy => write!(f, "was still busy with a previous round"),
            FailureReason::Panicked => write!(f, "panicked while training"),
            FailureReason::Cancelled => write!(f, "had its training task cancelled"),
            FailureReason::Client(e) => write!(f, "{e}"),
            FailureReason::Codec(e) => write!(f, "sent an undecodable update: {e}"),
            FailureReason::Shape(e) => write!(f, "sent an incompatible update: {e}"),
            FailureReason::Privacy(e) => write!(f, "{e}"),
        }
    }
}

impl Display for ClientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {} {}", self.client, self.reason)
    }
}

/// Run level failures, any of them halts the run.
#[derive(Debug)]
pub enum ServerErr {
    Config(String),
    Privacy(PrivacyErr),
    RoundFailure {
        round: usize,
        failures: Vec<ClientFailure>,
    },
    Aggregation {
        round: usize,
        source: AggregationErr,
    },
    Evaluation {
        round: usize,
        source: MlErr,
    },
    Persistence(PersistErr),
}

impl Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::Config(msg) => write!(f, "invalid configuration: {msg}"),
            ServerErr::Privacy(e) => write!(f, "{e}"),
            ServerErr::RoundFailure { round, failures } => {
                write!(f, "round {round} failed, no client answered")?;
                for failure in failures {
                    write!(f, "; {failure}")?;
                }
                Ok(())
            }
            ServerErr::Aggregation { round, source } => {
                write!(f, "round {round} failed to aggregate: {source}")
            }
            ServerErr::Evaluation { round, source } => {
                write!(f, "round {round} failed to evaluate: {source}")
            }
            ServerErr::Persistence(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerErr::Privacy(e) => Some(e),
            ServerErr::Aggregation { source, .. } => Some(source),
            ServerErr::Evaluation { source, .. } => Some(source),
            ServerErr::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PrivacyErr> for ServerErr {
    fn from(e: PrivacyErr) -> Self {
        ServerErr::Privacy(e)
    }
}

impl From<PersistErr> for ServerErr {
    fn from(e: PersistErr) -> Self {
        ServerErr::Persistence(e)
    }
}

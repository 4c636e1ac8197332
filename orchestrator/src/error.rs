use std::fmt;

use machine_learning::MlErr;
use server::ServerErr;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before any round runs.
    InvalidConfig(String),
    /// The dataset couldn't be read or split.
    Dataset(String),
    /// A client couldn't be set up with its shard.
    Client { client: usize, source: MlErr },
    /// The run halted.
    Server(ServerErr),
    /// An underlying I/O error not covered by the above variants.
    Io(std::io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Dataset(msg) => write!(f, "dataset error: {msg}"),
            Self::Client { client, source } => write!(f, "client {client} error: {source}"),
            Self::Server(e) => write!(f, "server error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client { source, .. } => Some(source),
            Self::Server(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ServerErr> for OrchestratorError {
    fn from(e: ServerErr) -> Self {
        Self::Server(e)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

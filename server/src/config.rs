use std::{num::NonZeroUsize, time::Duration};

use serde::{Deserialize, Serialize};

/// The differential privacy target of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpConfig {
    pub target_epsilon: f64,
    pub target_delta: f64,
    pub clip_norm: f64,
}

/// The immutable configuration of a federated run, validated by `Server::initialize`.
#[derive(Debug, Clone, PartialEq)]
pub struct FederationConfig {
    /// The fraction of clients selected every round, within `(0, 1]`.
    pub client_fraction: f64,
    pub global_rounds: NonZeroUsize,
    pub local_epochs: NonZeroUsize,
    /// Clients answering later than this are treated as non respondents.
    pub round_timeout: Option<Duration>,
    /// Compresses client updates with this many bits per value when present.
    pub bit_depth: Option<u8>,
    pub dp: Option<DpConfig>,
    pub seed: u64,
}

impl FederationConfig {
    /// Creates a new `FederationConfig` where every client takes part in every round, without
    /// timeout, compression nor differential privacy.
    pub fn new(global_rounds: NonZeroUsize, local_epochs: NonZeroUsize) -> Self {
        Self {
            client_fraction: 1.,
            global_rounds,
            local_epochs,
            round_timeout: None,
            bit_depth: None,
            dp: None,
            seed: 0,
        }
    }

    pub fn with_client_fraction(mut self, client_fraction: f64) -> Self {
        self.client_fraction = client_fraction;
        self
    }

    pub fn with_round_timeout(mut self, round_timeout: Duration) -> Self {
        self.round_timeout = Some(round_timeout);
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: u8) -> Self {
        self.bit_depth = Some(bit_depth);
        self
    }

    pub fn with_dp(mut self, dp: DpConfig) -> Self {
        self.dp = Some(dp);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

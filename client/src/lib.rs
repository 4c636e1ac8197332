mod client;
mod config;
mod error;
mod lease;
mod update;

use std::sync::Arc;

use parking_lot::Mutex;

pub use client::{Client, LocalOutcome};
pub use config::ClientConfig;
pub use error::{ClientErr, Result};
pub use update::{ClientUpdate, UpdatePayload};

/// A client shared between the driver and the tasks training it.
pub type ClientHandle = Arc<Mutex<Client>>;

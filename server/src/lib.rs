mod config;
mod error;
mod global;
mod history;
pub mod persistence;
mod pool;
mod selection;
mod server;

pub use config::{DpConfig, FederationConfig};
pub use error::{ClientFailure, FailureReason, Result, ServerErr};
pub use global::GlobalModel;
pub use history::{History, RoundRecord};
pub use pool::ClientPool;
pub use selection::ClientSelector;
pub use server::{RoundReport, Server};

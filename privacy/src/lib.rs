mod accountant;
mod error;
mod mechanism;

pub use accountant::{PrivacyBudget, RdpAccountant};
pub use error::{PrivacyErr, Result};
pub use mechanism::GaussianMechanism;

pub mod arch;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod initialization;
pub mod optimization;
pub mod specs;
mod test;
pub mod training;
pub mod weights;

pub use error::{MlErr, Result};
pub use weights::WeightSet;

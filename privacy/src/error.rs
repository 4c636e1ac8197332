use std::{
    error::Error,
    fmt::{self, Display},
};

use machine_learning::MlErr;

pub type Result<T> = std::result::Result<T, PrivacyErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum PrivacyErr {
    InfeasibleBudget {
        epsilon: f64,
        delta: f64,
        reason: String,
    },
    InvalidParameter(String),
    Weights(MlErr),
}

impl Display for PrivacyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyErr::InfeasibleBudget {
                epsilon,
                delta,
                reason,
            } => write!(
                f,
                "the privacy budget (epsilon = {epsilon}, delta = {delta}) is infeasible: {reason}"
            ),
            PrivacyErr::InvalidParameter(msg) => write!(f, "invalid privacy parameter: {msg}"),
            PrivacyErr::Weights(e) => write!(f, "can't privatize update: {e}"),
        }
    }
}

impl Error for PrivacyErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PrivacyErr::Weights(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for PrivacyErr {
    fn from(e: MlErr) -> Self {
        PrivacyErr::Weights(e)
    }
}

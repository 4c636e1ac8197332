use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    ShapeMismatch {
        layer: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    MissingLayer {
        layer: String,
    },
    UnexpectedLayer {
        layer: String,
    },
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    DataMismatch {
        x_rows: usize,
        y_rows: usize,
    },
    EmptyDataset,
    InvalidLabel {
        row: usize,
        label: f32,
        classes: usize,
    },
    NumericDivergence {
        epoch: usize,
        batch: usize,
        loss: f32,
    },
    InvalidSpec(String),
}

impl MlErr {
    /// Whether this error means two weight layouts disagree.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            MlErr::ShapeMismatch { .. } | MlErr::MissingLayer { .. } | MlErr::UnexpectedLayer { .. }
        )
    }

    /// Whether this error comes from a malformed dataset.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            MlErr::DataMismatch { .. } | MlErr::EmptyDataset | MlErr::InvalidLabel { .. }
        )
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                layer,
                expected,
                got,
            } => write!(
                f,
                "shape mismatch on layer '{layer}': expected {expected:?}, got {got:?}"
            ),
            MlErr::MissingLayer { layer } => write!(f, "missing layer '{layer}'"),
            MlErr::UnexpectedLayer { layer } => write!(f, "unexpected layer '{layer}'"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "there's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::DataMismatch { x_rows, y_rows } => write!(
                f,
                "features and labels have different lengths: {x_rows} vs {y_rows}"
            ),
            MlErr::EmptyDataset => write!(f, "the dataset has no samples"),
            MlErr::InvalidLabel {
                row,
                label,
                classes,
            } => write!(
                f,
                "label {label} at row {row} is not a class index below {classes}"
            ),
            MlErr::NumericDivergence { epoch, batch, loss } => write!(
                f,
                "training diverged at epoch {epoch}, batch {batch}: loss is {loss}"
            ),
            MlErr::InvalidSpec(msg) => write!(f, "invalid spec: {msg}"),
        }
    }
}

impl Error for MlErr {}

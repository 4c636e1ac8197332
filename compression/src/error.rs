use std::{
    error::Error,
    fmt::{self, Display},
};

pub type Result<T> = std::result::Result<T, CodecErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum CodecErr {
    InvalidBitDepth { bit_depth: u8 },
    BitDepthMismatch { expected: u8, got: u8 },
    NonFinite { layer: String },
}

impl Display for CodecErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecErr::InvalidBitDepth { bit_depth } => {
                write!(f, "invalid bit depth {bit_depth}, it must be within 2..=32")
            }
            CodecErr::BitDepthMismatch { expected, got } => write!(
                f,
                "encoded weights use {got} bits but the codec expects {expected}"
            ),
            CodecErr::NonFinite { layer } => {
                write!(f, "layer '{layer}' holds non finite values and can't be encoded")
            }
        }
    }
}

impl Error for CodecErr {}

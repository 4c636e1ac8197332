mod codec;
mod encoded;
mod error;

pub use codec::WeightCodec;
pub use encoded::{EncodedTensor, EncodedWeightSet};
pub use error::{CodecErr, Result};

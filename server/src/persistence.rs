//! Lossless storage of weight sets in the safetensors format.

use std::{
    error::Error,
    fmt::{self, Display},
    fs, io,
    path::Path,
};

use machine_learning::WeightSet;
use ndarray::{ArrayD, IxDyn};
use safetensors::{Dtype, SafeTensorError, SafeTensors, tensor::TensorView};

#[derive(Debug)]
pub enum PersistErr {
    Io(io::Error),
    Format(SafeTensorError),
    UnsupportedDtype { layer: String, dtype: String },
    Shape { layer: String },
}

impl Display for PersistErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistErr::Io(e) => write!(f, "io error: {e}"),
            PersistErr::Format(e) => write!(f, "safetensors error: {e}"),
            PersistErr::UnsupportedDtype { layer, dtype } => {
                write!(f, "layer '{layer}' is stored as {dtype}, only F32 is supported")
            }
            PersistErr::Shape { layer } => {
                write!(f, "layer '{layer}' has a shape that doesn't match its data")
            }
        }
    }
}

impl Error for PersistErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PersistErr::Io(e) => Some(e),
            PersistErr::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PersistErr {
    fn from(e: io::Error) -> Self {
        PersistErr::Io(e)
    }
}

impl From<SafeTensorError> for PersistErr {
    fn from(e: SafeTensorError) -> Self {
        PersistErr::Format(e)
    }
}

/// Serializes `weights` into safetensors bytes, every tensor stored as F32.
pub fn to_bytes(weights: &WeightSet) -> Result<Vec<u8>, PersistErr> {
    let tensors: Vec<(&str, Vec<f32>, Vec<usize>)> = weights
        .iter()
        .map(|(layer, tensor)| {
            let data = tensor.iter().copied().collect();
            (layer.as_str(), data, tensor.shape().to_vec())
        })
        .collect();

    let views = tensors
        .iter()
        .map(|(layer, data, shape)| {
            let bytes: &[u8] = bytemuck::cast_slice(data);
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)?;
            Ok((*layer, view))
        })
        .collect::<Result<Vec<_>, SafeTensorError>>()?;

    Ok(safetensors::tensor::serialize(views, &None)?)
}

/// Deserializes safetensors bytes back into a `WeightSet`.
pub fn from_bytes(bytes: &[u8]) -> Result<WeightSet, PersistErr> {
    let tensors = SafeTensors::deserialize(bytes)?;
    let mut weights = WeightSet::new();

    for (layer, view) in tensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(PersistErr::UnsupportedDtype {
                layer,
                dtype: format!("{:?}", view.dtype()),
            });
        }

        let data: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let tensor = ArrayD::from_shape_vec(IxDyn(view.shape()), data)
            .map_err(|_| PersistErr::Shape {
                layer: layer.clone(),
            })?;
        weights.insert(layer, tensor);
    }

    Ok(weights)
}

/// Writes `weights` to `path`.
pub fn save<P: AsRef<Path>>(weights: &WeightSet, path: P) -> Result<(), PersistErr> {
    fs::write(path, to_bytes(weights)?)?;
    Ok(())
}

/// Reads the weights stored at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<WeightSet, PersistErr> {
    from_bytes(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, arr1};

    use super::*;

    #[test]
    fn round_trip_is_bit_exact() {
        let w = Array2::from_shape_fn((3, 2), |(i, j)| (i as f32 - 1.3) * (j as f32 + 0.7) / 3.);
        let weights = WeightSet::from_iter([
            ("dense_0.weight", w.into_dyn()),
            ("dense_0.bias", arr1(&[f32::MIN_POSITIVE, -0.0, 1e-38]).into_dyn()),
        ]);

        let back = from_bytes(&to_bytes(&weights).unwrap()).unwrap();
        assert_eq!(back.layout(), weights.layout());

        for ((_, a), (_, b)) in back.iter().zip(weights.iter()) {
            assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            from_bytes(b"definitely not safetensors"),
            Err(PersistErr::Format(_))
        ));
    }
}

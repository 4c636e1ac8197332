use std::collections::BTreeMap;

use machine_learning::WeightSet;
use ndarray::ArrayD;
use rayon::prelude::*;

use crate::{CodecErr, EncodedTensor, EncodedWeightSet, Result};

/// Lossy quantization of weights into `bit_depth`-bit signed integer codes.
///
/// Every tensor gets its own scale, `ceil(max |w|) / (2^(bit_depth - 1) - 1)`, so each value is
/// reconstructed within half a scale step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightCodec {
    bit_depth: u8,
}

impl WeightCodec {
    pub const MIN_BIT_DEPTH: u8 = 2;
    pub const MAX_BIT_DEPTH: u8 = 32;

    /// Creates a new `WeightCodec`.
    ///
    /// # Arguments
    /// * `bit_depth` - The amount of bits of every code, sign included.
    ///
    /// # Returns
    /// An error if `bit_depth` is not within `2..=32`.
    pub fn new(bit_depth: u8) -> Result<Self> {
        if !(Self::MIN_BIT_DEPTH..=Self::MAX_BIT_DEPTH).contains(&bit_depth) {
            return Err(CodecErr::InvalidBitDepth { bit_depth });
        }

        Ok(Self { bit_depth })
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// The largest code magnitude, `2^(bit_depth - 1) - 1`.
    pub fn max_code(&self) -> i64 {
        (1i64 << (self.bit_depth - 1)) - 1
    }

    /// Returns the quantization scale of `tensor`, zero when every value is zero.
    pub fn scale_for(&self, tensor: &ArrayD<f32>) -> f32 {
        let max = tensor.iter().fold(0f32, |max, v| max.max(v.abs()));
        (max.ceil() as f64 / self.max_code() as f64) as f32
    }

    /// Quantizes every tensor of `weights`.
    ///
    /// # Returns
    /// An error naming the first layer holding a NaN or infinite value.
    pub fn encode(&self, weights: &WeightSet) -> Result<EncodedWeightSet> {
        let layers: Vec<_> = weights.iter().collect();

        let tensors = layers
            .into_par_iter()
            .map(|(layer, tensor)| {
                if tensor.iter().any(|v| !v.is_finite()) {
                    return Err(CodecErr::NonFinite {
                        layer: layer.clone(),
                    });
                }

                Ok((layer.clone(), self.encode_tensor(tensor)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(EncodedWeightSet::new(self.bit_depth, tensors))
    }

    fn encode_tensor(&self, tensor: &ArrayD<f32>) -> EncodedTensor {
        let scale = self.scale_for(tensor);
        let max_code = self.max_code() as f64;

        let codes = if scale == 0. {
            ArrayD::zeros(tensor.raw_dim())
        } else {
            let scale = scale as f64;
            tensor.mapv(|v| (v as f64 / scale).round().clamp(-max_code, max_code) as i32)
        };

        EncodedTensor { scale, codes }
    }

    /// Reconstructs the weights, `code * scale` for every value.
    ///
    /// # Returns
    /// An error if `encoded` was produced with a different bit depth.
    pub fn decode(&self, encoded: &EncodedWeightSet) -> Result<WeightSet> {
        if encoded.bit_depth() != self.bit_depth {
            return Err(CodecErr::BitDepthMismatch {
                expected: self.bit_depth,
                got: encoded.bit_depth(),
            });
        }

        let tensors: Vec<_> = encoded.iter().collect();
        let decoded: Vec<(String, ArrayD<f32>)> = tensors
            .into_par_iter()
            .map(|(layer, EncodedTensor { scale, codes })| {
                let scale = *scale as f64;
                (layer.clone(), codes.mapv(|c| (c as f64 * scale) as f32))
            })
            .collect();

        Ok(decoded.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr1};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn single(values: Vec<f32>) -> WeightSet {
        WeightSet::from_iter([("w", arr1(&values).into_dyn())])
    }

    #[test]
    fn rejects_invalid_bit_depths() {
        for bit_depth in [0, 1, 33] {
            assert_eq!(
                WeightCodec::new(bit_depth),
                Err(CodecErr::InvalidBitDepth { bit_depth })
            );
        }
    }

    #[test]
    fn eight_bits_max_two() {
        let codec = WeightCodec::new(8).unwrap();
        let values: Vec<f32> = (0..=400).map(|i| (i as f32 - 200.) / 100.).collect();
        let weights = single(values.clone());

        let encoded = codec.encode(&weights).unwrap();
        let scale = encoded.get("w").unwrap().scale;
        assert!((scale - 2.0 / 127.0).abs() < 1e-6);
        assert!((scale - 0.01575).abs() < 1e-4);

        let decoded = codec.decode(&encoded).unwrap();
        for (got, want) in decoded.get("w").unwrap().iter().zip(&values) {
            assert!((got - want).abs() <= 0.008, "{got} vs {want}");
        }
    }

    #[test]
    fn error_bounded_by_half_scale() {
        let mut rng = StdRng::seed_from_u64(11);

        for bit_depth in 2..=16 {
            let codec = WeightCodec::new(bit_depth).unwrap();
            let amp = rng.random_range(0.1f32..20.0);
            let values: Vec<f32> = (0..64).map(|_| rng.random_range(-amp..amp)).collect();
            let weights = single(values.clone());

            let encoded = codec.encode(&weights).unwrap();
            let tensor = encoded.get("w").unwrap();
            let bound = tensor.scale / 2. + 1e-5 * amp;
            assert!(
                tensor
                    .codes
                    .iter()
                    .all(|&c| (c as i64).abs() <= codec.max_code())
            );

            let decoded = codec.decode(&encoded).unwrap();
            for (got, want) in decoded.get("w").unwrap().iter().zip(&values) {
                assert!((got - want).abs() <= bound, "bits {bit_depth}: {got} vs {want}");
            }
        }
    }

    #[test]
    fn zero_tensor() {
        let codec = WeightCodec::new(4).unwrap();
        let weights = WeightSet::from_iter([("w", ArrayD::zeros(IxDyn(&[2, 3])))]);

        let encoded = codec.encode(&weights).unwrap();
        assert_eq!(encoded.get("w").unwrap().scale, 0.);
        assert_eq!(codec.decode(&encoded).unwrap(), weights);
    }

    #[test]
    fn non_finite_is_rejected() {
        let codec = WeightCodec::new(8).unwrap();
        let err = codec.encode(&single(vec![1., f32::NAN])).unwrap_err();
        assert_eq!(err, CodecErr::NonFinite { layer: "w".into() });
    }

    #[test]
    fn decode_checks_bit_depth() {
        let encoded = WeightCodec::new(8)
            .unwrap()
            .encode(&single(vec![0.5]))
            .unwrap();

        let err = WeightCodec::new(4).unwrap().decode(&encoded).unwrap_err();
        assert_eq!(err, CodecErr::BitDepthMismatch { expected: 4, got: 8 });
    }

    #[test]
    fn payload_bits_count_codes_and_scales() {
        let codec = WeightCodec::new(8).unwrap();
        let weights = WeightSet::from_iter([
            ("a", ArrayD::zeros(IxDyn(&[10]))),
            ("b", ArrayD::zeros(IxDyn(&[2, 5]))),
        ]);

        let encoded = codec.encode(&weights).unwrap();
        assert_eq!(encoded.payload_bits(), 20 * 8 + 2 * 32);
    }
}

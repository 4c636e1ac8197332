use std::collections::{BTreeMap, btree_map};

use ndarray::ArrayD;

/// A single quantized tensor: `value ≈ code * scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTensor {
    pub scale: f32,
    pub codes: ArrayD<i32>,
}

/// The compact representation of a `WeightSet` produced by a `WeightCodec`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedWeightSet {
    bit_depth: u8,
    tensors: BTreeMap<String, EncodedTensor>,
}

impl EncodedWeightSet {
    pub(crate) fn new(bit_depth: u8, tensors: BTreeMap<String, EncodedTensor>) -> Self {
        Self { bit_depth, tensors }
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn get(&self, layer: &str) -> Option<&EncodedTensor> {
        self.tensors.get(layer)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, EncodedTensor> {
        self.tensors.iter()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Returns the size in bits this set takes on the wire: `bit_depth` bits per code plus one
    /// `f32` scale per tensor.
    pub fn payload_bits(&self) -> usize {
        self.tensors
            .values()
            .map(|tensor| tensor.codes.len() * self.bit_depth as usize + 32)
            .sum()
    }
}

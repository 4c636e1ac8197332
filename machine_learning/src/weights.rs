use std::collections::{BTreeMap, btree_map};

use ndarray::{ArrayD, Zip};

use crate::{MlErr, Result};

/// An ordered mapping from layer identifier to that layer's tensor.
///
/// Every `WeightSet` exchanged during a run shares the same layer identifiers and shapes,
/// `check_compatible` is the single place where that invariant gets enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightSet {
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl WeightSet {
    /// Creates a new empty `WeightSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tensor under `layer`, returning the previous one if any.
    pub fn insert<S: Into<String>>(&mut self, layer: S, tensor: ArrayD<f32>) -> Option<ArrayD<f32>> {
        self.tensors.insert(layer.into(), tensor)
    }

    pub fn get(&self, layer: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(layer)
    }

    pub fn get_mut(&mut self, layer: &str) -> Option<&mut ArrayD<f32>> {
        self.tensors.get_mut(layer)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ArrayD<f32>> {
        self.tensors.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, ArrayD<f32>> {
        self.tensors.iter_mut()
    }

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Returns the total amount of scalar parameters across every layer.
    pub fn num_params(&self) -> usize {
        self.tensors.values().map(ArrayD::len).sum()
    }

    /// Returns the layer identifiers along with their shapes.
    pub fn layout(&self) -> Vec<(String, Vec<usize>)> {
        self.tensors
            .iter()
            .map(|(layer, tensor)| (layer.clone(), tensor.shape().to_vec()))
            .collect()
    }

    /// Checks that `other` has exactly the same layers and shapes as `self`.
    ///
    /// # Returns
    /// The first disagreement found, layers are visited in order.
    pub fn check_compatible(&self, other: &WeightSet) -> Result<()> {
        check_layout(&self.layout(), other)
    }

    /// Whether every value in the set is finite.
    pub fn is_finite(&self) -> bool {
        self.tensors
            .values()
            .all(|tensor| tensor.iter().all(|v| v.is_finite()))
    }

    /// Computes the L2 norm of all the parameters, as if they were flattened into a single vector.
    pub fn l2_norm(&self) -> f64 {
        self.tensors
            .values()
            .flat_map(|tensor| tensor.iter())
            .map(|&v| (v as f64).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Multiplies every value by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.tensors
            .values_mut()
            .for_each(|tensor| tensor.mapv_inplace(|v| v * factor));
    }

    /// Computes `self - other` layer by layer.
    pub fn sub(&self, other: &WeightSet) -> Result<WeightSet> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Computes `self + other` layer by layer.
    pub fn add(&self, other: &WeightSet) -> Result<WeightSet> {
        self.zip_with(other, |a, b| a + b)
    }

    fn zip_with<F>(&self, other: &WeightSet, f: F) -> Result<WeightSet>
    where
        F: Fn(f32, f32) -> f32,
    {
        self.check_compatible(other)?;

        let tensors = self
            .tensors
            .iter()
            .zip(other.tensors.values())
            .map(|((layer, a), b)| {
                let out = Zip::from(a).and(b).map_collect(|&a, &b| f(a, b));
                (layer.clone(), out)
            })
            .collect();

        Ok(Self { tensors })
    }
}

/// Checks a `WeightSet` against an expected layout of layer identifiers and shapes.
pub fn check_layout(expected: &[(String, Vec<usize>)], weights: &WeightSet) -> Result<()> {
    for (layer, shape) in expected {
        let Some(tensor) = weights.get(layer) else {
            return Err(MlErr::MissingLayer {
                layer: layer.clone(),
            });
        };

        if tensor.shape() != shape.as_slice() {
            return Err(MlErr::ShapeMismatch {
                layer: layer.clone(),
                expected: shape.clone(),
                got: tensor.shape().to_vec(),
            });
        }
    }

    if let Some(layer) = weights
        .layers()
        .find(|layer| !expected.iter().any(|(id, _)| id == layer))
    {
        return Err(MlErr::UnexpectedLayer {
            layer: layer.to_string(),
        });
    }

    Ok(())
}

impl<S: Into<String>> FromIterator<(S, ArrayD<f32>)> for WeightSet {
    fn from_iter<I: IntoIterator<Item = (S, ArrayD<f32>)>>(iter: I) -> Self {
        Self {
            tensors: iter
                .into_iter()
                .map(|(layer, tensor)| (layer.into(), tensor))
                .collect(),
        }
    }
}

impl IntoIterator for WeightSet {
    type Item = (String, ArrayD<f32>);
    type IntoIter = btree_map::IntoIter<String, ArrayD<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.into_iter()
    }
}

impl<'a> IntoIterator for &'a WeightSet {
    type Item = (&'a String, &'a ArrayD<f32>);
    type IntoIter = btree_map::Iter<'a, String, ArrayD<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr1};

    use super::*;

    fn single(layer: &str, values: &[f32]) -> WeightSet {
        WeightSet::from_iter([(layer, arr1(values).into_dyn())])
    }

    #[test]
    fn compatible_sets() {
        let a = single("dense_0.bias", &[1., 2.]);
        let b = single("dense_0.bias", &[3., 4.]);
        assert!(a.check_compatible(&b).is_ok());
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a = single("dense_0.bias", &[1., 2.]);
        let b = single("dense_0.bias", &[3., 4., 5.]);

        let err = a.check_compatible(&b).unwrap_err();
        assert_eq!(
            err,
            MlErr::ShapeMismatch {
                layer: "dense_0.bias".into(),
                expected: vec![2],
                got: vec![3],
            }
        );
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn missing_and_unexpected_layers() {
        let a = single("a", &[1.]);
        let b = single("b", &[1.]);

        assert!(matches!(
            a.check_compatible(&b),
            Err(MlErr::MissingLayer { .. })
        ));

        let mut c = a.clone();
        c.insert("b", ArrayD::zeros(IxDyn(&[1])));
        assert!(matches!(
            a.check_compatible(&c),
            Err(MlErr::UnexpectedLayer { .. })
        ));
    }

    #[test]
    fn arithmetic_and_norm() {
        let a = single("w", &[3., 4.]);
        let b = single("w", &[1., 1.]);

        let diff = a.sub(&b).unwrap();
        assert_eq!(diff, single("w", &[2., 3.]));
        assert_eq!(diff.add(&b).unwrap(), a);
        assert_eq!(a.l2_norm(), 5.0);
        assert_eq!(a.num_params(), 2);
    }

    #[test]
    fn finiteness() {
        assert!(single("w", &[0., 1.]).is_finite());
        assert!(!single("w", &[f32::NAN]).is_finite());
    }
}

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax cross-entropy over raw logits.
///
/// Labels hold a single column with the class index of every sample.
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    fn labels(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<Vec<usize>> {
        if y.ncols() != 1 || y.nrows() != y_pred.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "class labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        let classes = y_pred.ncols();
        y.column(0)
            .iter()
            .enumerate()
            .map(|(row, &label)| {
                let valid = label >= 0. && label.fract() == 0. && (label as usize) < classes;
                if !valid {
                    return Err(MlErr::InvalidLabel {
                        row,
                        label,
                        classes,
                    });
                }

                Ok(label as usize)
            })
            .collect()
    }
}

/// Returns the softmax of `logits` with the max subtracted for stability.
pub(crate) fn softmax(logits: ArrayView1<f32>) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let labels = Self::labels(&y_pred, &y)?;

        let total: f32 = y_pred
            .axis_iter(Axis(0))
            .zip(&labels)
            .map(|(logits, &label)| {
                let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let log_sum = logits.iter().map(|&z| (z - max).exp()).sum::<f32>().ln();
                log_sum + max - logits[label]
            })
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        let labels = Self::labels(&y_pred, &y)?;
        let n = labels.len() as f32;
        let mut grad = Array2::zeros(y_pred.raw_dim());

        for ((logits, mut row), &label) in y_pred
            .axis_iter(Axis(0))
            .zip(grad.axis_iter_mut(Axis(0)))
            .zip(&labels)
        {
            for (g, p) in row.iter_mut().zip(softmax(logits)) {
                *g = p / n;
            }
            row[label] -= 1. / n;
        }

        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_logits() {
        let y_pred = array![[0.0, 0.0], [0.0, 0.0]];
        let y = array![[0.0], [1.0]];

        let loss = CrossEntropy.loss(y_pred.view(), y.view()).unwrap();
        assert!((loss - 2f32.ln()).abs() < 1e-6);

        let grad = CrossEntropy.loss_prime(y_pred.view(), y.view()).unwrap();
        assert_eq!(grad, array![[-0.25, 0.25], [0.25, -0.25]]);
    }

    #[test]
    fn out_of_range_label() {
        let y_pred = array![[0.0, 0.0]];
        let y = array![[2.0]];

        assert!(matches!(
            CrossEntropy.loss(y_pred.view(), y.view()),
            Err(MlErr::InvalidLabel { row: 0, .. })
        ));
    }

    #[test]
    fn large_logits_stay_finite() {
        let y_pred = array![[1000.0, -1000.0]];
        let y = array![[1.0]];

        let loss = CrossEntropy.loss(y_pred.view(), y.view()).unwrap();
        assert!(loss.is_finite());
    }
}

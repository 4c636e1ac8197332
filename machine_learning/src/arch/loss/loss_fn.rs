use ndarray::{Array2, ArrayView2};

use crate::Result;

/// Measures how far a batch of predictions is from its labels.
pub trait LossFn: Send + Sync {
    /// Returns the mean loss over the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>;

    /// Returns the derivative of `loss` with respect to every prediction.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>>;
}

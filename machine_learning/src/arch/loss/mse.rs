use ndarray::{Array2, ArrayView2};

use super::LossFn;
use crate::{MlErr, Result};

/// Mean squared error loss function.
#[derive(Default, Clone, Copy, Debug)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }

    fn check(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<()> {
        if y_pred.shape() != y.shape() {
            return Err(MlErr::SizeMismatch {
                what: "predictions and labels",
                got: y_pred.len(),
                expected: y.len(),
            });
        }

        Ok(())
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        Self::check(&y_pred, &y)?;

        Ok((&y_pred - &y)
            .mapv(|x| x.powi(2))
            .mean()
            .unwrap_or_default())
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        Self::check(&y_pred, &y)?;

        Ok((&y_pred - &y) * (2.0 / y_pred.len() as f32))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn loss_and_derivative() {
        let y_pred = array![[1.0, 3.0]];
        let y = array![[0.0, 1.0]];

        assert_eq!(Mse.loss(y_pred.view(), y.view()).unwrap(), 2.5);
        assert_eq!(
            Mse.loss_prime(y_pred.view(), y.view()).unwrap(),
            array![[1.0, 2.0]]
        );
    }

    #[test]
    fn shape_disagreement() {
        let y_pred = array![[1.0, 3.0]];
        let y = array![[0.0]];
        assert!(Mse.loss(y_pred.view(), y.view()).is_err());
    }
}

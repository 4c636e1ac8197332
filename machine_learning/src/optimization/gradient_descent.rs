use ndarray::{ArrayViewD, ArrayViewMutD};

use super::Optimizer;
use crate::{MlErr, Result};

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of `learning_rate`.
    fn update_params(
        &mut self,
        _slot: usize,
        mut params: ArrayViewMutD<f32>,
        grad: ArrayViewD<f32>,
    ) -> Result<()> {
        if params.shape() != grad.shape() {
            return Err(MlErr::SizeMismatch {
                what: "parameters and gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        params.scaled_add(-self.learning_rate, &grad);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn step_against_gradient() {
        let mut params = arr1(&[1.0f32, 2.0]).into_dyn();
        let grad = arr1(&[1.0f32, -1.0]).into_dyn();

        GradientDescent::new(0.5)
            .update_params(0, params.view_mut(), grad.view())
            .unwrap();

        assert_eq!(params, arr1(&[0.5, 2.5]).into_dyn());
    }
}

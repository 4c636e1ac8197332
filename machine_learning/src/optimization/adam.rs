use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

use super::Optimizer;
use crate::{MlErr, Result};

#[derive(Debug)]
struct Moments {
    v: ArrayD<f32>,
    s: ArrayD<f32>,
    beta1_t: f32,
    beta2_t: f32,
}

/// The Adam optimization algorithm, with bias corrected moments.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    moments: Vec<Option<Moments>>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            moments: Vec::new(),
        }
    }

    fn moments(&mut self, slot: usize, shape: &[usize]) -> &mut Moments {
        if self.moments.len() <= slot {
            self.moments.resize_with(slot + 1, || None);
        }

        self.moments[slot].get_or_insert_with(|| Moments {
            v: ArrayD::zeros(shape),
            s: ArrayD::zeros(shape),
            beta1_t: 1.,
            beta2_t: 1.,
        })
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn update_params(
        &mut self,
        slot: usize,
        params: ArrayViewMutD<f32>,
        grad: ArrayViewD<f32>,
    ) -> Result<()> {
        if params.shape() != grad.shape() {
            return Err(MlErr::SizeMismatch {
                what: "parameters and gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        let moments = self.moments(slot, params.shape());
        if moments.v.shape() != params.shape() {
            return Err(MlErr::SizeMismatch {
                what: "optimizer state",
                got: params.len(),
                expected: moments.v.len(),
            });
        }

        moments.beta1_t *= b1;
        moments.beta2_t *= b2;

        let bc1 = 1. - moments.beta1_t;
        let bc2 = 1. - moments.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        Zip::from(params)
            .and(&grad)
            .and(&mut moments.v)
            .and(&mut moments.s)
            .for_each(|p, &g, v, s| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut params = arr1(&[1.0f32, 1.0]).into_dyn();
        let grad = arr1(&[2.0f32, -3.0]).into_dyn();

        let mut adam = Adam::new(0.1, 0.9, 0.999, 1e-8);
        adam.update_params(0, params.view_mut(), grad.view())
            .unwrap();

        assert!((params[0] - 0.9).abs() < 1e-4);
        assert!((params[1] - 1.1).abs() < 1e-4);
    }

    #[test]
    fn slots_are_independent() {
        let mut a = arr1(&[0.0f32]).into_dyn();
        let mut b = arr1(&[0.0f32, 0.0]).into_dyn();

        let mut adam = Adam::default();
        adam.update_params(0, a.view_mut(), arr1(&[1.0f32]).into_dyn().view())
            .unwrap();
        adam.update_params(3, b.view_mut(), arr1(&[1.0f32, 1.0]).into_dyn().view())
            .unwrap();

        assert!(adam.update_params(0, b.view_mut(), arr1(&[1.0f32, 1.0]).into_dyn().view()).is_err());
    }
}

use ndarray::{ArrayViewD, ArrayViewMutD};

use crate::Result;

/// Updates a model's parameters given their gradient.
///
/// Every tensor of the model is identified by a `slot`, stateful optimizers keep one
/// state per slot.
pub trait Optimizer: Send {
    /// Applies one step of the algorithm's learning rule to `params`.
    ///
    /// # Arguments
    /// * `slot` - The position of the tensor within the model.
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient used for taking the step.
    ///
    /// # Returns
    /// An error if `params` and `grad` have different shapes.
    fn update_params(
        &mut self,
        slot: usize,
        params: ArrayViewMutD<f32>,
        grad: ArrayViewD<f32>,
    ) -> Result<()>;
}

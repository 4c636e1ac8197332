use ndarray::{Array2, ArrayView2};

use crate::{Result, WeightSet, arch::loss::LossFn, optimization::Optimizer};

/// A trainable model whose parameters can be exchanged as a `WeightSet`.
pub trait Model: Send {
    /// Returns the identifier and shape of every tensor of the model, in `WeightSet` order.
    fn architecture(&self) -> Vec<(String, Vec<usize>)>;

    /// Overwrites every parameter of the model.
    ///
    /// # Arguments
    /// * `weights` - The new parameters, must match `architecture` exactly.
    ///
    /// # Returns
    /// A shape mismatch error if the layouts disagree, in which case the model is left untouched.
    fn load_weights(&mut self, weights: &WeightSet) -> Result<()>;

    /// Returns a copy of the model's parameters.
    fn weights(&self) -> WeightSet;

    /// Makes a forward pass through the model.
    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss over a single batch and updates the parameters
    /// according to the optimizer.
    ///
    /// # Arguments
    /// * `x` - The batch's features.
    /// * `y` - The batch's labels.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    ///
    /// # Returns
    /// The batch loss, measured before the update.
    fn backprop(
        &mut self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &dyn LossFn,
        optimizer: &mut dyn Optimizer,
    ) -> Result<f32>;
}

/// Builds fresh instances of a fixed architecture.
pub trait ModelFactory: Send + Sync {
    /// Returns a new model, its parameters are meaningless until `load_weights` is called.
    fn build(&self) -> Box<dyn Model>;

    /// Returns the weights a run starts from.
    fn initial_weights(&self) -> Result<WeightSet>;

    /// Returns the architecture every model built by this factory has.
    fn architecture(&self) -> Vec<(String, Vec<usize>)> {
        self.build().architecture()
    }
}

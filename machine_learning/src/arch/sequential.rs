use ndarray::{Array1, Array2, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};

use super::{Model, ModelFactory, activations::ActFn, layers::Dense, loss::LossFn};
use crate::{
    MlErr, Result, WeightSet, initialization::WeightInit, optimization::Optimizer,
    weights::check_layout,
};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Dense::size).sum()
    }
}

fn weight_id(i: usize) -> String {
    format!("dense_{i}.weight")
}

fn bias_id(i: usize) -> String {
    format!("dense_{i}.bias")
}

impl Model for Sequential {
    fn architecture(&self) -> Vec<(String, Vec<usize>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                let (n, m) = layer.dim();
                [(weight_id(i), vec![n, m]), (bias_id(i), vec![m])]
            })
            .collect()
    }

    fn load_weights(&mut self, weights: &WeightSet) -> Result<()> {
        check_layout(&self.architecture(), weights)?;

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let (w_id, b_id) = (weight_id(i), bias_id(i));
            let w = weights
                .get(&w_id)
                .ok_or(MlErr::MissingLayer { layer: w_id })?;
            let b = weights
                .get(&b_id)
                .ok_or(MlErr::MissingLayer { layer: b_id })?;

            layer.set_weights(w.view(), b.view())?;
        }

        Ok(())
    }

    fn weights(&self) -> WeightSet {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                let (w, b) = layer.weights();
                [
                    (weight_id(i), w.clone().into_dyn()),
                    (bias_id(i), b.clone().into_dyn()),
                ]
            })
            .collect()
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let Some((first, rest)) = self.layers.split_first_mut() else {
            return Ok(x.to_owned());
        };

        let mut out = first.forward(x)?;
        for layer in rest {
            out = layer.forward(out.view())?;
        }

        Ok(out)
    }

    fn backprop(
        &mut self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &dyn LossFn,
        optimizer: &mut dyn Optimizer,
    ) -> Result<f32> {
        let y_pred = self.forward(x)?;
        let loss = loss_fn.loss(y_pred.view(), y)?;

        let mut d = loss_fn.loss_prime(y_pred.view(), y)?;
        for layer in self.layers.iter_mut().rev() {
            d = layer.backward(d)?;
        }

        for (i, layer) in self.layers.iter_mut().enumerate() {
            for (j, (params, grad)) in layer.params_and_grads().into_iter().enumerate() {
                optimizer.update_params(2 * i + j, params, grad)?;
            }
        }

        Ok(loss)
    }
}

/// Builds `Sequential` models of a fixed shape and draws their initial weights from a seed.
#[derive(Debug, Clone)]
pub struct SequentialFactory {
    layers: Vec<((usize, usize), Option<ActFn>)>,
    init: WeightInit,
    seed: u64,
}

impl SequentialFactory {
    /// Creates a new `SequentialFactory`.
    ///
    /// # Arguments
    /// * `layers` - The dimension and activation of each dense layer.
    /// * `init` - How the weight matrices of the initial model are drawn.
    /// * `seed` - The seed of the initial weights.
    ///
    /// # Returns
    /// An error if there are no layers or the dimensions of adjacent layers do not chain.
    pub fn new<I>(layers: I, init: WeightInit, seed: u64) -> Result<Self>
    where
        I: IntoIterator<Item = ((usize, usize), Option<ActFn>)>,
    {
        let layers: Vec<_> = layers.into_iter().collect();

        if layers.is_empty() {
            return Err(MlErr::InvalidSpec("a sequential needs at least one layer".into()));
        }

        for (i, pair) in layers.windows(2).enumerate() {
            let ((_, out), _) = pair[0];
            let ((inp, _), _) = pair[1];

            if out != inp {
                return Err(MlErr::InvalidSpec(format!(
                    "layer {i} outputs {out} values but layer {} takes {inp}",
                    i + 1
                )));
            }
        }

        if let Some(((n, m), _)) = layers.iter().find(|((n, m), _)| *n == 0 || *m == 0) {
            return Err(MlErr::InvalidSpec(format!(
                "dense layers need non-zero dimensions, got ({n}, {m})"
            )));
        }

        Ok(Self { layers, init, seed })
    }
}

impl ModelFactory for SequentialFactory {
    fn build(&self) -> Box<dyn Model> {
        let layers = self
            .layers
            .iter()
            .map(|&(dim, act_fn)| Dense::new(dim, act_fn));

        Box::new(Sequential::new(layers))
    }

    fn initial_weights(&self) -> Result<WeightSet> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut weights = WeightSet::new();

        for (i, &(dim, _)) in self.layers.iter().enumerate() {
            let w: Array2<f32> = self.init.sample(&mut rng, dim)?;
            weights.insert(weight_id(i), w.into_dyn());
            weights.insert(bias_id(i), Array1::<f32>::zeros(dim.1).into_dyn());
        }

        Ok(weights)
    }
}

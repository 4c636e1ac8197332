//! Serializable descriptions of the building blocks of this crate, used to carry them
//! through configuration files.

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    arch::{
        SequentialFactory,
        activations::ActFn,
        loss::{CrossEntropy, LossFn, Mse},
    },
    initialization::WeightInit,
    optimization::{Adam, GradientDescent, Optimizer},
};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Relu,
}

/// The specification for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
}

/// The specification for the `WeightInit` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSpec {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    XavierUniform,
    Kaiming,
}

/// The specification for the `Model` trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential {
        layers: Vec<LayerSpec>,
        init: InitSpec,
    },
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
    CrossEntropy,
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnSpec::Relu => ActFn::relu(),
        }
    }
}

impl From<InitSpec> for WeightInit {
    fn from(spec: InitSpec) -> Self {
        match spec {
            InitSpec::Const { value } => WeightInit::Const { value },
            InitSpec::Uniform { low, high } => WeightInit::Uniform { low, high },
            InitSpec::Normal { mean, std_dev } => WeightInit::Normal { mean, std_dev },
            InitSpec::XavierUniform => WeightInit::XavierUniform,
            InitSpec::Kaiming => WeightInit::Kaiming,
        }
    }
}

impl OptimizerSpec {
    /// Builds a fresh optimizer, stateful optimizers start with no accumulated state.
    pub fn build(&self) -> Box<dyn Optimizer> {
        match *self {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(learning_rate, beta1, beta2, epsilon)),
            OptimizerSpec::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate))
            }
        }
    }
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        OptimizerSpec::Adam {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl LossFnSpec {
    pub fn build(&self) -> Box<dyn LossFn> {
        match self {
            LossFnSpec::Mse => Box::new(Mse::new()),
            LossFnSpec::CrossEntropy => Box::new(CrossEntropy::new()),
        }
    }
}

impl ModelSpec {
    /// Builds the factory of the described model.
    ///
    /// # Arguments
    /// * `seed` - The seed the initial weights are drawn with.
    ///
    /// # Returns
    /// An error if the described layers are invalid.
    pub fn factory(&self, seed: u64) -> Result<SequentialFactory> {
        match self {
            ModelSpec::Sequential { layers, init } => {
                let layers = layers.iter().map(|layer| match *layer {
                    LayerSpec::Dense { dim, act_fn } => (dim, act_fn.map(ActFn::from)),
                });

                SequentialFactory::new(layers, (*init).into(), seed)
            }
        }
    }

    /// Returns the amount of features the model takes and outputs it produces.
    pub fn io_sizes(&self) -> Option<(usize, usize)> {
        match self {
            ModelSpec::Sequential { layers, .. } => {
                let LayerSpec::Dense { dim: first, .. } = layers.first()?;
                let LayerSpec::Dense { dim: last, .. } = layers.last()?;
                Some((first.0, last.1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ModelFactory;

    #[test]
    fn model_spec_from_json() {
        let json = r#"{
            "sequential": {
                "layers": [
                    { "dense": { "dim": [4, 8], "act_fn": { "sigmoid": { "amp": 1.0 } } } },
                    { "dense": { "dim": [8, 3], "act_fn": null } }
                ],
                "init": "xavier_uniform"
            }
        }"#;

        let spec: ModelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.io_sizes(), Some((4, 3)));

        let factory = spec.factory(1).unwrap();
        assert_eq!(factory.initial_weights().unwrap().num_params(), 4 * 8 + 8 + 8 * 3 + 3);
    }

    #[test]
    fn optimizer_spec_from_json() {
        let spec: OptimizerSpec =
            serde_json::from_str(r#"{ "gradient_descent": { "learning_rate": 0.5 } }"#).unwrap();
        assert_eq!(spec, OptimizerSpec::GradientDescent { learning_rate: 0.5 });

        let spec: LossFnSpec = serde_json::from_str(r#""cross_entropy""#).unwrap();
        assert_eq!(spec, LossFnSpec::CrossEntropy);
    }
}

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::{MlErr, Result};

/// How the weight matrix of a layer is drawn, biases always start at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    XavierUniform,
    Kaiming,
}

impl WeightInit {
    /// Samples a `(fan_in, fan_out)` weight matrix.
    ///
    /// # Arguments
    /// * `rng` - The random number generator the values are drawn with.
    /// * `dim` - The amount of inputs and outputs of the layer.
    ///
    /// # Returns
    /// An error if the distribution's parameters are invalid.
    pub fn sample<R: Rng>(&self, rng: &mut R, dim: (usize, usize)) -> Result<Array2<f32>> {
        let (fan_in, fan_out) = dim;

        match *self {
            WeightInit::Const { value } => Ok(Array2::from_elem(dim, value)),
            WeightInit::Uniform { low, high } => {
                let dist = Uniform::new(low, high).map_err(|e| {
                    MlErr::InvalidSpec(format!("uniform init [{low}, {high}): {e}"))
                })?;
                Ok(draw(rng, dim, dist))
            }
            WeightInit::Normal { mean, std_dev } => {
                let dist = Normal::new(mean, std_dev).map_err(|e| {
                    MlErr::InvalidSpec(format!("normal init ({mean}, {std_dev}): {e}"))
                })?;
                Ok(draw(rng, dim, dist))
            }
            WeightInit::XavierUniform => {
                let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
                WeightInit::Uniform {
                    low: -range,
                    high: range,
                }
                .sample(rng, dim)
            }
            WeightInit::Kaiming => {
                let std_dev = (2. / fan_in.max(1) as f32).sqrt();
                WeightInit::Normal { mean: 0., std_dev }.sample(rng, dim)
            }
        }
    }
}

fn draw<R: Rng, D: Distribution<f32>>(rng: &mut R, dim: (usize, usize), dist: D) -> Array2<f32> {
    Array2::from_shape_simple_fn(dim, || dist.sample(rng))
}

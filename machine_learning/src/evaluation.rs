use std::sync::Arc;

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    Result, WeightSet,
    arch::{ModelFactory, loss::LossFn},
    dataset::Dataset,
};

/// The metrics of a model measured over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub loss: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accuracy: Option<f32>,
}

/// Measures the quality of a set of weights.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, weights: &WeightSet) -> Result<Metrics>;
}

/// Evaluates weights over a held-out dataset no client trains on.
pub struct HoldoutEvaluator {
    factory: Arc<dyn ModelFactory>,
    loss_fn: Box<dyn LossFn>,
    dataset: Dataset,
}

impl HoldoutEvaluator {
    /// Creates a new `HoldoutEvaluator`.
    ///
    /// # Arguments
    /// * `factory` - Builds the model the weights are loaded into.
    /// * `loss_fn` - The loss reported in the metrics.
    /// * `dataset` - The held-out samples.
    pub fn new(factory: Arc<dyn ModelFactory>, loss_fn: Box<dyn LossFn>, dataset: Dataset) -> Self {
        Self {
            factory,
            loss_fn,
            dataset,
        }
    }
}

impl Evaluator for HoldoutEvaluator {
    fn evaluate(&self, weights: &WeightSet) -> Result<Metrics> {
        let mut model = self.factory.build();
        model.load_weights(weights)?;

        let y_pred = model.forward(self.dataset.x())?;
        let loss = self.loss_fn.loss(y_pred.view(), self.dataset.y())?;

        Ok(Metrics {
            loss,
            accuracy: accuracy(y_pred.view(), self.dataset.y()),
        })
    }
}

/// Computes the fraction of correct predictions when the labels allow it.
///
/// Multi-output models are compared by arg max against a class index column, single-output
/// models are thresholded at 0.5 when every label is either 0 or 1.
fn accuracy(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Option<f32> {
    if y.ncols() != 1 || y.nrows() == 0 {
        return None;
    }

    let labels = y.column(0);
    let correct = if y_pred.ncols() > 1 {
        y_pred
            .axis_iter(Axis(0))
            .zip(labels)
            .filter(|(row, label)| {
                let arg_max = row
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 { (i, v) } else { best }
                    })
                    .0;
                arg_max as f32 == **label
            })
            .count()
    } else {
        if !labels.iter().all(|&l| l == 0. || l == 1.) {
            return None;
        }

        y_pred
            .column(0)
            .iter()
            .zip(labels)
            .filter(|&(&p, &l)| (p >= 0.5) == (l == 1.))
            .count()
    };

    Some(correct as f32 / y.nrows() as f32)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn arg_max_accuracy() {
        let y_pred = array![[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]];
        let y = array![[1.], [0.], [0.]];
        assert_eq!(accuracy(y_pred.view(), y.view()), Some(2. / 3.));
    }

    #[test]
    fn threshold_accuracy() {
        let y_pred = array![[0.9], [0.4], [0.6], [0.1]];
        let y = array![[1.], [0.], [0.], [0.]];
        assert_eq!(accuracy(y_pred.view(), y.view()), Some(0.75));
    }

    #[test]
    fn regression_has_no_accuracy() {
        let y_pred = array![[0.9], [2.4]];
        let y = array![[1.], [2.5]];
        assert_eq!(accuracy(y_pred.view(), y.view()), None);
    }
}

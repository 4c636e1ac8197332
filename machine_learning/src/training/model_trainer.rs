use std::num::NonZeroUsize;

use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// Runs mini-batch training passes over a dataset with a fixed optimizer, loss function and
/// batch size.
pub struct ModelTrainer {
    optimizer: Box<dyn Optimizer>,
    loss_fn: Box<dyn LossFn>,
    batch_size: NonZeroUsize,
}

impl ModelTrainer {
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the weights on each batch.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `batch_size` - The maximum amount of samples per batch.
    pub fn new(
        optimizer: Box<dyn Optimizer>,
        loss_fn: Box<dyn LossFn>,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            optimizer,
            loss_fn,
            batch_size,
        }
    }

    /// Performs `epochs` passes over `dataset` in a fresh random order each time. The dataset
    /// itself is never reordered, so equal generators give equal runs.
    ///
    /// # Arguments
    /// * `model` - The model being trained, its parameters are updated in place.
    /// * `dataset` - The training samples.
    /// * `epochs` - The amount of passes over the dataset.
    /// * `rng` - The generator used for shuffling.
    ///
    /// # Returns
    /// The loss of every batch in order, or `NumericDivergence` as soon as one of them or the
    /// parameters left by an epoch are not finite.
    pub fn train<R: Rng>(
        &mut self,
        model: &mut dyn Model,
        dataset: &Dataset,
        epochs: usize,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        let batches_per_epoch = dataset.len().div_ceil(self.batch_size.get());
        let mut losses = Vec::with_capacity(epochs * batches_per_epoch);
        let mut order: Vec<usize> = (0..dataset.len()).collect();

        for epoch in 0..epochs {
            order.shuffle(rng);

            for (batch, (x, y)) in dataset.batches_in(&order, self.batch_size).enumerate() {
                let loss = model.backprop(
                    x.view(),
                    y.view(),
                    self.loss_fn.as_ref(),
                    self.optimizer.as_mut(),
                )?;

                if !loss.is_finite() {
                    return Err(MlErr::NumericDivergence { epoch, batch, loss });
                }

                losses.push(loss);
            }

            // A finite loss can still leave overflowed parameters behind.
            if !model.weights().is_finite() {
                return Err(MlErr::NumericDivergence {
                    epoch,
                    batch: batches_per_epoch.saturating_sub(1),
                    loss: losses.last().copied().unwrap_or(f32::NAN),
                });
            }

            debug!(epoch = epoch; "epoch finished");
        }

        Ok(losses)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        arch::{ModelFactory, SequentialFactory, loss::Mse},
        initialization::WeightInit,
        optimization::GradientDescent,
    };

    fn linear() -> Box<dyn Model> {
        let factory =
            SequentialFactory::new([((1, 1), None)], WeightInit::Const { value: 0. }, 0).unwrap();
        let mut model = factory.build();
        model.load_weights(&factory.initial_weights().unwrap()).unwrap();
        model
    }

    #[test]
    fn one_loss_per_batch() {
        let dataset = Dataset::new(array![[1.], [2.], [3.]], array![[2.], [4.], [6.]]).unwrap();
        let mut trainer = ModelTrainer::new(
            Box::new(GradientDescent::new(0.01)),
            Box::new(Mse),
            NonZeroUsize::new(2).unwrap(),
        );

        let mut model = linear();
        let losses = trainer
            .train(model.as_mut(), &dataset, 3, &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(losses.len(), 3 * 2);
    }

    #[test]
    fn divergence_is_reported() {
        let dataset = Dataset::new(array![[1e30]], array![[1.]]).unwrap();
        let mut trainer = ModelTrainer::new(
            Box::new(GradientDescent::new(1e30)),
            Box::new(Mse),
            NonZeroUsize::new(1).unwrap(),
        );

        let mut model = linear();
        let err = trainer
            .train(model.as_mut(), &dataset, 5, &mut StdRng::seed_from_u64(0))
            .unwrap_err();

        assert!(matches!(err, MlErr::NumericDivergence { .. }));
    }

    #[test]
    fn overflowed_parameters_are_reported() {
        let dataset = Dataset::new(array![[1e30]], array![[1.]]).unwrap();
        let mut trainer = ModelTrainer::new(
            Box::new(GradientDescent::new(1e30)),
            Box::new(Mse),
            NonZeroUsize::new(1).unwrap(),
        );

        let mut model = linear();
        let err = trainer
            .train(model.as_mut(), &dataset, 1, &mut StdRng::seed_from_u64(0))
            .unwrap_err();

        assert!(matches!(err, MlErr::NumericDivergence { epoch: 0, batch: 0, .. }));
    }

    #[test]
    fn same_seed_same_run() {
        let dataset = Dataset::new(
            array![[1.], [2.], [3.], [4.], [5.]],
            array![[2.], [4.], [6.], [8.], [10.]],
        )
        .unwrap();
        let original = dataset.x().to_owned();

        let run = |seed| {
            let mut trainer = ModelTrainer::new(
                Box::new(GradientDescent::new(0.01)),
                Box::new(Mse),
                NonZeroUsize::new(2).unwrap(),
            );
            let mut model = linear();
            let losses = trainer
                .train(model.as_mut(), &dataset, 2, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            (losses, model.weights())
        };

        let first = run(3);
        assert_eq!(dataset.x(), original);
        assert_eq!(run(3), first);
    }
}

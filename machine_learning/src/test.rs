#![cfg(test)]

use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    arch::{ModelFactory, SequentialFactory, activations::ActFn, loss::Mse},
    dataset::Dataset,
    evaluation::{Evaluator, HoldoutEvaluator},
    initialization::WeightInit,
    optimization::{Adam, GradientDescent},
    training::ModelTrainer,
};

fn train_gate(
    data: &[f32],
    x_size: usize,
    factory: SequentialFactory,
    trainer: &mut ModelTrainer,
    epochs: usize,
) -> f32 {
    let dataset = Dataset::from_flat(data, x_size, 1).unwrap();
    let mut model = factory.build();
    model.load_weights(&factory.initial_weights().unwrap()).unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    trainer
        .train(model.as_mut(), &dataset, epochs, &mut rng)
        .unwrap();

    let evaluator = HoldoutEvaluator::new(
        std::sync::Arc::new(factory),
        Box::new(Mse),
        Dataset::from_flat(data, x_size, 1).unwrap(),
    );
    let metrics = evaluator.evaluate(&model.weights()).unwrap();
    assert_eq!(metrics.accuracy, Some(1.));
    metrics.loss
}

#[test]
fn test_ml_and2_gate_convergence() {
    let and2 = [
        0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 1.0, //
    ];

    let factory = SequentialFactory::new(
        [((2, 1), Some(ActFn::sigmoid(1.)))],
        WeightInit::Const { value: 0. },
        0,
    )
    .unwrap();
    let mut trainer = ModelTrainer::new(
        Box::new(GradientDescent::new(5.)),
        Box::new(Mse),
        NonZeroUsize::new(4).unwrap(),
    );

    let loss = train_gate(&and2, 2, factory, &mut trainer, 2000);
    assert!(loss < 0.05, "loss {loss}");
}

#[test]
fn test_ml_xor2_gate_convergence() {
    let xor2 = [
        0.0, 0.0, 0.0, //
        0.0, 1.0, 1.0, //
        1.0, 0.0, 1.0, //
        1.0, 1.0, 0.0, //
    ];

    let factory = SequentialFactory::new(
        [
            ((2, 8), Some(ActFn::sigmoid(1.))),
            ((8, 1), Some(ActFn::sigmoid(1.))),
        ],
        WeightInit::Normal {
            mean: 0.,
            std_dev: 1.,
        },
        7,
    )
    .unwrap();
    let mut trainer = ModelTrainer::new(
        Box::new(Adam::new(0.05, 0.9, 0.999, 1e-8)),
        Box::new(Mse),
        NonZeroUsize::new(4).unwrap(),
    );

    let loss = train_gate(&xor2, 2, factory, &mut trainer, 3000);
    assert!(loss < 0.05, "loss {loss}");
}

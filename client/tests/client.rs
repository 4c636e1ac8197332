use std::num::NonZeroUsize;

use client::{Client, ClientConfig, ClientErr, UpdatePayload};
use compression::WeightCodec;
use machine_learning::{
    WeightSet,
    arch::{ModelFactory, SequentialFactory, activations::ActFn},
    initialization::WeightInit,
    specs::{LossFnSpec, OptimizerSpec},
};
use ndarray::{Array2, array};

fn factory() -> SequentialFactory {
    SequentialFactory::new(
        [((2, 4), Some(ActFn::sigmoid(1.))), ((4, 1), None)],
        WeightInit::XavierUniform,
        3,
    )
    .unwrap()
}

fn config(learning_rate: f32) -> ClientConfig {
    ClientConfig::new(NonZeroUsize::new(2).unwrap(), LossFnSpec::Mse, 11)
        .with_optimizer(OptimizerSpec::GradientDescent { learning_rate })
}

fn client_with_data(index: usize) -> Client {
    let mut client = Client::new(index, config(0.1));
    client
        .set_local_data(
            array![[0., 0.], [0., 1.], [1., 0.], [1., 1.], [0.5, 0.5]],
            array![[0.], [1.], [1.], [2.], [1.]],
        )
        .unwrap();
    client
}

#[test]
fn mismatched_data_is_rejected() {
    let mut client = Client::new(4, config(0.1));
    let err = client
        .set_local_data(Array2::zeros((3, 2)), Array2::zeros((2, 1)))
        .unwrap_err();

    assert!(matches!(err, ClientErr::Data { client: 4, .. }));
    assert_eq!(client.samples(), 0);
}

#[test]
fn wrong_weights_are_a_shape_mismatch() {
    let mut client = client_with_data(1);
    let mut weights = factory().initial_weights().unwrap();
    weights.insert("dense_0.weight", Array2::<f32>::zeros((3, 4)).into_dyn());

    let err = client.init_model(&factory(), &weights).unwrap_err();
    assert!(matches!(err, ClientErr::ShapeMismatch { client: 1, .. }));
    assert!(!client.has_model());
}

#[test]
fn training_needs_model_and_data() {
    let mut client = Client::new(0, config(0.1));
    assert_eq!(
        client.local_train(1).unwrap_err(),
        ClientErr::NoData { client: 0 }
    );

    let mut client = client_with_data(0);
    assert_eq!(
        client.local_train(1).unwrap_err(),
        ClientErr::NoModel { client: 0 }
    );
}

#[test]
fn local_train_reports_every_batch() {
    let factory = factory();
    let global = factory.initial_weights().unwrap();
    let mut client = client_with_data(2);

    client.init_model(&factory, &global).unwrap();
    let outcome = client.local_train(3).unwrap();

    // 5 samples in batches of 2 make 3 batches per epoch.
    assert_eq!(outcome.losses.len(), 9);
    assert_ne!(outcome.weights, global);
    assert!(outcome.weights.check_compatible(&global).is_ok());

    client.reset();
    assert!(!client.has_model());
    assert_eq!(client.samples(), 5);
}

#[test]
fn round_releases_model_and_is_reproducible() {
    let factory = factory();
    let global = factory.initial_weights().unwrap();
    let mut client = client_with_data(3);

    let first = client.train_round(1, &factory, &global, 2, None).unwrap();
    assert!(!client.has_model());

    let again = client.train_round(1, &factory, &global, 2, None).unwrap();
    assert_eq!(first, again);

    assert_eq!(first.client, 3);
    assert_eq!(first.round, 1);
    assert_eq!(first.samples, 5);
    assert!(matches!(first.payload, UpdatePayload::Raw(_)));
    assert_eq!(first.payload.payload_bits(), global.num_params() * 32);

    // 5 samples in batches of 2 over 2 epochs.
    assert_eq!(first.losses.len(), 6);
    let mean = first.mean_loss().unwrap();
    assert!((mean - first.losses.iter().sum::<f32>() / 6.).abs() < 1e-6);
}

#[test]
fn earlier_rounds_leave_no_trace() {
    let factory = factory();
    let global = factory.initial_weights().unwrap();

    let mut fresh = client_with_data(3);
    let expected = fresh.train_round(1, &factory, &global, 2, None).unwrap();

    let mut seasoned = client_with_data(3);
    seasoned.train_round(0, &factory, &global, 3, None).unwrap();
    let restarted = seasoned.train_round(1, &factory, &global, 2, None).unwrap();

    assert_eq!(restarted.losses, expected.losses);
    assert_eq!(restarted.payload, expected.payload);
}

#[test]
fn round_encodes_when_asked() {
    let factory = factory();
    let global = factory.initial_weights().unwrap();
    let codec = WeightCodec::new(8).unwrap();
    let mut client = client_with_data(0);

    let update = client
        .train_round(0, &factory, &global, 1, Some(&codec))
        .unwrap();

    let UpdatePayload::Encoded(encoded) = &update.payload else {
        panic!("expected an encoded payload");
    };
    assert_eq!(encoded.bit_depth(), 8);
    assert!(update.payload.payload_bits() < global.num_params() * 32);
}

#[test]
fn divergence_still_releases_model() {
    let factory =
        SequentialFactory::new([((1, 1), None)], WeightInit::Const { value: 0. }, 0).unwrap();
    let global: WeightSet = factory.initial_weights().unwrap();

    let mut client = Client::new(7, config(1e30));
    client
        .set_local_data(array![[1e30], [1e30]], array![[1.], [1.]])
        .unwrap();

    let err = client
        .train_round(5, &factory, &global, 3, None)
        .unwrap_err();

    assert!(matches!(err, ClientErr::NumericDivergence { client: 7, .. }));
    assert!(!client.has_model());
}

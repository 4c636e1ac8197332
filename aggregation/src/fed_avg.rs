use log::debug;
use machine_learning::WeightSet;
use ndarray::ArrayD;
use rayon::prelude::*;

use crate::{Aggregator, Result, WeightedUpdate, aggregator::prepare};

/// Federated averaging: every layer becomes the average of the updates weighted by their
/// sample counts, `sum(n_i * w_i) / sum(n_i)`.
///
/// Sums are accumulated in `f64` following client index order, so identical inputs always give
/// bit-identical outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FedAvg;

impl FedAvg {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for FedAvg {
    fn name(&self) -> &'static str {
        "fed_avg"
    }

    fn combine(&self, updates: &[WeightedUpdate]) -> Result<WeightSet> {
        let updates = prepare(updates)?;
        let total: f64 = updates.iter().map(|u| u.samples as f64).sum();

        let layers: Vec<(String, ArrayD<f32>)> = updates[0]
            .weights
            .layout()
            .into_par_iter()
            .map(|(layer, shape)| {
                let mut acc = ArrayD::<f64>::zeros(shape);

                for update in &updates {
                    if let Some(tensor) = update.weights.get(&layer) {
                        let n = update.samples as f64;
                        acc.zip_mut_with(tensor, |acc, &w| *acc += n * w as f64);
                    }
                }

                (layer, acc.mapv(|v| (v / total) as f32))
            })
            .collect();

        debug!(updates = updates.len(), samples = total; "averaged updates");
        Ok(layers.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr1};
    use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

    use super::*;
    use crate::AggregationErr;

    fn update(client: usize, samples: usize, values: &[f32]) -> WeightedUpdate {
        WeightedUpdate::new(
            client,
            samples,
            WeightSet::from_iter([("dense_0.bias", arr1(values).into_dyn())]),
        )
    }

    #[test]
    fn consensus_of_ones() {
        let updates = [
            update(0, 10, &[1.; 4]),
            update(1, 20, &[1.; 4]),
            update(2, 30, &[1.; 4]),
        ];

        let avg = FedAvg.combine(&updates).unwrap();
        assert_eq!(avg.get("dense_0.bias").unwrap(), &arr1(&[1.; 4]).into_dyn());
    }

    #[test]
    fn weighted_by_samples() {
        let updates = [update(0, 1, &[0., 4.]), update(1, 3, &[4., 0.])];

        let avg = FedAvg.combine(&updates).unwrap();
        assert_eq!(avg.get("dense_0.bias").unwrap(), &arr1(&[3., 1.]).into_dyn());
    }

    #[test]
    fn idempotent() {
        let values = [0.1, -2.5, 3.75, 1e-3];
        let updates: Vec<_> = (0..5).map(|c| update(c, 7, &values)).collect();

        let avg = FedAvg.combine(&updates).unwrap();
        assert_eq!(avg, updates[0].weights);
    }

    #[test]
    fn order_does_not_matter() {
        let mut updates: Vec<_> = (0..8)
            .map(|c| update(c, c + 1, &[c as f32 * 0.3, -(c as f32) / 7.]))
            .collect();

        let expected = FedAvg.combine(&updates).unwrap();
        updates.shuffle(&mut StdRng::seed_from_u64(1));
        assert_eq!(FedAvg.combine(&updates).unwrap(), expected);
    }

    #[test]
    fn empty_aggregation() {
        assert_eq!(FedAvg.combine(&[]), Err(AggregationErr::EmptyAggregation));
        assert_eq!(
            FedAvg.combine(&[update(0, 0, &[1.]), update(1, 0, &[2.])]),
            Err(AggregationErr::EmptyAggregation)
        );
    }

    #[test]
    fn zero_sample_updates_are_ignored() {
        let updates = [update(0, 0, &[100.]), update(1, 5, &[2.])];
        let avg = FedAvg.combine(&updates).unwrap();
        assert_eq!(avg.get("dense_0.bias").unwrap(), &arr1(&[2.]).into_dyn());
    }

    #[test]
    fn shape_mismatch_names_client() {
        let mut odd = update(3, 5, &[1.]);
        odd.weights
            .insert("dense_0.bias", ArrayD::zeros(IxDyn(&[2, 2])));

        let err = FedAvg.combine(&[update(0, 5, &[1.]), odd]).unwrap_err();
        assert!(matches!(err, AggregationErr::ShapeMismatch { client: 3, .. }));
    }
}

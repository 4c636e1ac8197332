use machine_learning::WeightSet;
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;

use crate::{AggregationErr, Result};

/// The weights a client produced during a round along with how many samples it trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedUpdate {
    pub client: usize,
    pub samples: usize,
    pub weights: WeightSet,
}

impl WeightedUpdate {
    pub fn new(client: usize, samples: usize, weights: WeightSet) -> Self {
        Self {
            client,
            samples,
            weights,
        }
    }
}

/// A strategy for merging the updates of a round into the next global weights.
pub trait Aggregator: Send + Sync {
    /// The name the strategy is logged with.
    fn name(&self) -> &'static str;

    /// Combines `updates` into a single `WeightSet`.
    ///
    /// Updates with no samples are ignored and the rest are visited in client index order, so
    /// the result does not depend on the order of `updates`.
    ///
    /// # Returns
    /// `EmptyAggregation` if no update has samples, `ShapeMismatch` if the layouts disagree.
    fn combine(&self, updates: &[WeightedUpdate]) -> Result<WeightSet>;
}

/// Drops the updates without samples, sorts the rest by client and checks their layouts.
pub(crate) fn prepare(updates: &[WeightedUpdate]) -> Result<Vec<&WeightedUpdate>> {
    let mut usable: Vec<_> = updates.iter().filter(|u| u.samples > 0).collect();
    usable.sort_by_key(|u| u.client);

    let Some(first) = usable.first() else {
        return Err(AggregationErr::EmptyAggregation);
    };

    for update in &usable[1..] {
        first
            .weights
            .check_compatible(&update.weights)
            .map_err(|source| AggregationErr::ShapeMismatch {
                client: update.client,
                source,
            })?;
    }

    Ok(usable)
}

/// Builds a `WeightSet` by reducing, for every layer and position, the values of all the
/// updates in order.
pub(crate) fn coordinate_wise<F>(updates: &[&WeightedUpdate], reduce: F) -> WeightSet
where
    F: Fn(&mut [f32]) -> f32 + Sync,
{
    let Some(first) = updates.first() else {
        return WeightSet::new();
    };
    let layout = first.weights.layout();

    let layers: Vec<(String, ArrayD<f32>)> = layout
        .into_par_iter()
        .map(|(layer, shape)| {
            let tensors: Vec<Vec<f32>> = updates
                .iter()
                .filter_map(|u| u.weights.get(&layer))
                .map(|t| t.iter().copied().collect())
                .collect();

            let mut out = ArrayD::zeros(IxDyn(&shape));
            let mut column = vec![0.; tensors.len()];

            for (i, value) in out.iter_mut().enumerate() {
                for (slot, tensor) in column.iter_mut().zip(&tensors) {
                    *slot = tensor[i];
                }
                *value = reduce(&mut column);
            }

            (layer, out)
        })
        .collect();

    layers.into_iter().collect()
}

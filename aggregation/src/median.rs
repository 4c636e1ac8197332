use machine_learning::WeightSet;

use crate::{
    Aggregator, Result, WeightedUpdate,
    aggregator::{coordinate_wise, prepare},
};

/// Coordinate-wise median of the updates, sample counts only decide which updates take part.
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl Median {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for Median {
    fn name(&self) -> &'static str {
        "median"
    }

    fn combine(&self, updates: &[WeightedUpdate]) -> Result<WeightSet> {
        let updates = prepare(updates)?;

        Ok(coordinate_wise(&updates, |values| {
            values.sort_by(f32::total_cmp);

            let mid = values.len() / 2;
            if values.len() % 2 == 1 {
                values[mid]
            } else {
                ((values[mid - 1] as f64 + values[mid] as f64) / 2.) as f32
            }
        }))
    }
}

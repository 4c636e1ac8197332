use machine_learning::WeightSet;

use crate::{
    AggregationErr, Aggregator, Result, WeightedUpdate,
    aggregator::{coordinate_wise, prepare},
};

/// Coordinate-wise mean after discarding the `trim_fraction` smallest and largest values.
#[derive(Debug, Clone, Copy)]
pub struct TrimmedMean {
    trim_fraction: f64,
}

impl TrimmedMean {
    /// Creates a new `TrimmedMean`.
    ///
    /// # Arguments
    /// * `trim_fraction` - The fraction of values dropped from each end, within `[0, 0.5)`.
    pub fn new(trim_fraction: f64) -> Result<Self> {
        if !(0. ..0.5).contains(&trim_fraction) {
            return Err(AggregationErr::InvalidParameter(format!(
                "trim fraction {trim_fraction} is not within [0, 0.5)"
            )));
        }

        Ok(Self { trim_fraction })
    }
}

impl Aggregator for TrimmedMean {
    fn name(&self) -> &'static str {
        "trimmed_mean"
    }

    fn combine(&self, updates: &[WeightedUpdate]) -> Result<WeightSet> {
        let updates = prepare(updates)?;
        let trim = (updates.len() as f64 * self.trim_fraction).floor() as usize;

        Ok(coordinate_wise(&updates, |values| {
            values.sort_by(f32::total_cmp);

            let kept = &values[trim..values.len() - trim];
            let sum: f64 = kept.iter().map(|&v| v as f64).sum();
            (sum / kept.len() as f64) as f32
        }))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    fn update(client: usize, values: &[f32]) -> WeightedUpdate {
        WeightedUpdate::new(client, 1, WeightSet::from_iter([("w", arr1(values).into_dyn())]))
    }

    #[test]
    fn invalid_fraction() {
        assert!(TrimmedMean::new(0.5).is_err());
        assert!(TrimmedMean::new(-0.1).is_err());
    }

    #[test]
    fn trims_both_ends() {
        let updates = [
            update(0, &[-100.]),
            update(1, &[1.]),
            update(2, &[2.]),
            update(3, &[3.]),
            update(4, &[100.]),
        ];

        let mean = TrimmedMean::new(0.2).unwrap().combine(&updates).unwrap();
        assert_eq!(mean.get("w").unwrap(), &arr1(&[2.]).into_dyn());
    }

    #[test]
    fn no_trim_is_plain_mean() {
        let updates = [update(0, &[1.]), update(1, &[2.])];

        let mean = TrimmedMean::new(0.).unwrap().combine(&updates).unwrap();
        assert_eq!(mean.get("w").unwrap(), &arr1(&[1.5]).into_dyn());
    }
}

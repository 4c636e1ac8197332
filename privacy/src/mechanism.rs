use machine_learning::WeightSet;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use crate::{PrivacyBudget, PrivacyErr, Result};

/// Clips client updates and perturbs them with Gaussian noise calibrated by a `PrivacyBudget`.
#[derive(Debug, Clone)]
pub struct GaussianMechanism {
    clip_norm: f64,
    noise: Option<Normal<f64>>,
    rng: StdRng,
}

impl GaussianMechanism {
    /// Creates a new `GaussianMechanism`.
    ///
    /// # Arguments
    /// * `budget` - Holds the clipping bound and the noise multiplier.
    /// * `seed` - The seed of the noise.
    ///
    /// # Returns
    /// An error if the resulting noise standard deviation is not finite.
    pub fn new(budget: &PrivacyBudget, seed: u64) -> Result<Self> {
        let std_dev = budget.noise_multiplier * budget.clip_norm;

        let noise = if std_dev > 0. {
            let normal = Normal::new(0., std_dev).map_err(|e| {
                PrivacyErr::InvalidParameter(format!("noise standard deviation {std_dev}: {e}"))
            })?;
            Some(normal)
        } else {
            None
        };

        Ok(Self {
            clip_norm: budget.clip_norm,
            noise,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn clip_norm(&self) -> f64 {
        self.clip_norm
    }

    /// Privatizes `update` relative to the `reference` weights it was trained from.
    ///
    /// The difference `update - reference` is scaled down to an L2 norm of at most `clip_norm`,
    /// every coordinate then gets independent noise of standard deviation `sigma * clip_norm`.
    ///
    /// # Returns
    /// The privatized weights and the norm of the difference before clipping.
    pub fn privatize(
        &mut self,
        update: &WeightSet,
        reference: &WeightSet,
    ) -> Result<(WeightSet, f64)> {
        let mut delta = update.sub(reference)?;
        let norm = clip(&mut delta, self.clip_norm);

        if let Some(noise) = &self.noise {
            for (_, tensor) in delta.iter_mut() {
                tensor.mapv_inplace(|v| (v as f64 + noise.sample(&mut self.rng)) as f32);
            }
        }

        Ok((reference.add(&delta)?, norm))
    }
}

/// Scales `delta` so its L2 norm is at most `clip_norm`.
///
/// # Returns
/// The norm before clipping.
fn clip(delta: &mut WeightSet, clip_norm: f64) -> f64 {
    let norm = delta.l2_norm();

    if norm > clip_norm {
        delta.scale((clip_norm / norm) as f32);
    }

    norm
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    fn budget(noise_multiplier: f64) -> PrivacyBudget {
        PrivacyBudget {
            target_epsilon: 1.,
            target_delta: 1e-5,
            sample_rate: 1.,
            steps: 1,
            clip_norm: 1.,
            noise_multiplier,
        }
    }

    fn single(values: &[f32]) -> WeightSet {
        WeightSet::from_iter([("w", arr1(values).into_dyn())])
    }

    #[test]
    fn clips_large_updates() {
        let mut mechanism = GaussianMechanism::new(&budget(0.), 0).unwrap();
        let reference = single(&[1., 1.]);
        let update = single(&[4., 5.]);

        let (private, norm) = mechanism.privatize(&update, &reference).unwrap();
        assert_eq!(norm, 5.);

        let delta = private.sub(&reference).unwrap();
        assert!((delta.l2_norm() - 1.).abs() < 1e-6);
        assert!((delta.get("w").unwrap()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn small_updates_pass_through() {
        let mut mechanism = GaussianMechanism::new(&budget(0.), 0).unwrap();
        let reference = single(&[0., 0.]);
        let update = single(&[0.3, 0.4]);

        let (private, _) = mechanism.privatize(&update, &reference).unwrap();
        assert_eq!(private, update);
    }

    #[test]
    fn noise_is_seeded() {
        let reference = single(&[0.; 16]);
        let update = single(&[0.1; 16]);

        let mut a = GaussianMechanism::new(&budget(2.), 5).unwrap();
        let mut b = GaussianMechanism::new(&budget(2.), 5).unwrap();

        let (a, _) = a.privatize(&update, &reference).unwrap();
        let (b, _) = b.privatize(&update, &reference).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, update);
    }

    #[test]
    fn mismatched_layouts() {
        let mut mechanism = GaussianMechanism::new(&budget(1.), 0).unwrap();
        let err = mechanism
            .privatize(&single(&[1.]), &single(&[1., 2.]))
            .unwrap_err();
        assert!(matches!(err, PrivacyErr::Weights(_)));
    }
}

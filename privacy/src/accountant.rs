use log::debug;
use serde::Serialize;

use crate::{PrivacyErr, Result};

/// The noise and clipping a run has to apply to stay within its privacy target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrivacyBudget {
    pub target_epsilon: f64,
    pub target_delta: f64,
    pub sample_rate: f64,
    pub steps: usize,
    pub clip_norm: f64,
    pub noise_multiplier: f64,
}

/// Rényi differential privacy accountant for the sampled Gaussian mechanism.
///
/// The privacy loss of `steps` compositions is tracked at a fixed set of integer orders and
/// converted to an `(epsilon, delta)` guarantee, keeping the tightest order.
#[derive(Debug, Clone)]
pub struct RdpAccountant {
    orders: Vec<u32>,
    max_sigma: f64,
    iterations: usize,
}

impl Default for RdpAccountant {
    fn default() -> Self {
        let orders = (2..=64).chain([80, 96, 128, 256]).collect();
        Self::new(orders, 1e4)
    }
}

impl RdpAccountant {
    const ITERATIONS: usize = 80;

    /// Creates a new `RdpAccountant`.
    ///
    /// # Arguments
    /// * `orders` - The Rényi orders the loss is tracked at, every one must be at least 2.
    /// * `max_sigma` - The largest noise multiplier `calibrate_noise` searches up to.
    pub fn new(orders: Vec<u32>, max_sigma: f64) -> Self {
        let orders = orders.into_iter().filter(|&alpha| alpha >= 2).collect();

        Self {
            orders,
            max_sigma,
            iterations: Self::ITERATIONS,
        }
    }

    /// Computes the epsilon spent after `steps` applications of the sampled Gaussian mechanism.
    ///
    /// # Arguments
    /// * `sigma` - The noise multiplier.
    /// * `sample_rate` - The probability of each record taking part in a step.
    /// * `steps` - The amount of composed steps.
    /// * `delta` - The target delta.
    ///
    /// # Returns
    /// The smallest epsilon over the tracked orders, infinite if no order gives a finite bound.
    pub fn epsilon(&self, sigma: f64, sample_rate: f64, steps: usize, delta: f64) -> f64 {
        if steps == 0 || sample_rate == 0. {
            return 0.;
        }

        if sigma <= 0. {
            return f64::INFINITY;
        }

        self.orders
            .iter()
            .map(|&alpha| {
                let alpha_f = alpha as f64;
                let rdp = rdp_step(sigma, sample_rate, alpha) * steps as f64;
                let eps = rdp - (delta.ln() + alpha_f.ln()) / (alpha_f - 1.)
                    + ((alpha_f - 1.) / alpha_f).ln();

                if eps.is_nan() { f64::INFINITY } else { eps }
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Finds the smallest noise multiplier for which `steps` compositions stay within
    /// `(target_epsilon, target_delta)`.
    ///
    /// The search bisects `[0, max_sigma]` a fixed amount of times, so identical inputs always
    /// give identical outputs and more steps never yield less noise.
    ///
    /// # Returns
    /// `InfeasibleBudget` if the target is not positive and finite, delta is outside `(0, 1)`,
    /// or not even `max_sigma` satisfies the target.
    pub fn calibrate_noise(
        &self,
        target_epsilon: f64,
        target_delta: f64,
        sample_rate: f64,
        steps: usize,
    ) -> Result<f64> {
        let infeasible = |reason: String| PrivacyErr::InfeasibleBudget {
            epsilon: target_epsilon,
            delta: target_delta,
            reason,
        };

        if !(target_epsilon.is_finite() && target_epsilon > 0.) {
            return Err(infeasible("epsilon must be positive and finite".into()));
        }

        if !(target_delta > 0. && target_delta < 1.) {
            return Err(infeasible("delta must be within (0, 1)".into()));
        }

        if !(0. ..=1.).contains(&sample_rate) {
            return Err(PrivacyErr::InvalidParameter(format!(
                "sample rate {sample_rate} is not a probability"
            )));
        }

        if steps == 0 || sample_rate == 0. {
            return Ok(0.);
        }

        let satisfies = |sigma: f64| {
            self.epsilon(sigma, sample_rate, steps, target_delta) <= target_epsilon
        };

        if !satisfies(self.max_sigma) {
            return Err(infeasible(format!(
                "not even a noise multiplier of {} is enough for {steps} steps",
                self.max_sigma
            )));
        }

        let (mut lo, mut hi) = (0., self.max_sigma);
        for _ in 0..self.iterations {
            let mid = (lo + hi) / 2.;
            if satisfies(mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        debug!(sigma = hi, steps = steps, sample_rate = sample_rate; "calibrated noise");
        Ok(hi)
    }

    /// Calibrates the noise and bundles it with the rest of the privacy parameters.
    ///
    /// # Returns
    /// An error if the budget is infeasible or `clip_norm` is not positive and finite.
    pub fn budget(
        &self,
        target_epsilon: f64,
        target_delta: f64,
        sample_rate: f64,
        steps: usize,
        clip_norm: f64,
    ) -> Result<PrivacyBudget> {
        if !(clip_norm.is_finite() && clip_norm > 0.) {
            return Err(PrivacyErr::InvalidParameter(format!(
                "clip norm {clip_norm} must be positive and finite"
            )));
        }

        let noise_multiplier =
            self.calibrate_noise(target_epsilon, target_delta, sample_rate, steps)?;

        Ok(PrivacyBudget {
            target_epsilon,
            target_delta,
            sample_rate,
            steps,
            clip_norm,
            noise_multiplier,
        })
    }
}

/// The RDP of a single step of the sampled Gaussian mechanism at integer order `alpha`.
fn rdp_step(sigma: f64, q: f64, alpha: u32) -> f64 {
    let alpha_f = alpha as f64;

    if q >= 1. {
        return alpha_f / (2. * sigma.powi(2));
    }

    // log(A_alpha) = log sum_i C(alpha, i) q^i (1 - q)^(alpha - i) exp((i^2 - i) / (2 sigma^2))
    let (log_q, log_1mq) = (q.ln(), (1. - q).ln());
    let mut log_binom = 0.;
    let mut terms = Vec::with_capacity(alpha as usize + 1);

    for i in 0..=alpha {
        if i > 0 {
            log_binom += ((alpha - i + 1) as f64).ln() - (i as f64).ln();
        }

        let i_f = i as f64;
        terms.push(
            log_binom
                + i_f * log_q
                + (alpha_f - i_f) * log_1mq
                + (i_f * i_f - i_f) / (2. * sigma.powi(2)),
        );
    }

    (log_sum_exp(&terms) / (alpha_f - 1.)).max(0.)
}

fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }

    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}

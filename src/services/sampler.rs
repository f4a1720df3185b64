use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::models::Weights;

/// Draws θ_used = clip(θ + σ·z) with an independent standard normal `z` per weight.
pub fn sample<R: Rng + ?Sized>(baseline: &Weights, sigma: f64, rng: &mut R) -> Weights {
    sample_with(baseline, sigma, || StandardNormal.sample(rng))
}

/// Same as [`sample`] with the normal draws supplied by `draw`.
///
/// A non-positive or non-finite `sigma` returns the baseline without drawing.
pub fn sample_with(baseline: &Weights, sigma: f64, mut draw: impl FnMut() -> f64) -> Weights {
    if !sigma.is_finite() || sigma <= 0.0 {
        return *baseline;
    }
    Weights::from_fn(|key| baseline.get(key) + sigma * draw())
}

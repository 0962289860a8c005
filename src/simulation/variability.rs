use rand_distr::{Normal, Distribution};
use crate::error::{SimError, SimResult};
use crate::models::clamp_vision;

/// Fraction of a positive vision change retained when no injection was given.
pub const UNTREATED_GAIN_FACTOR: f64 = 0.3;

/// Measurement error distribution for vision scores, `None` when `measurement_sd` is zero.
pub fn measurement_noise(measurement_sd: f64) -> SimResult<Option<Normal<f64>>> {
    if measurement_sd <= 0.0 {
        return Ok(None);
    }

    Normal::new(0.0, measurement_sd)
        .map(Some)
        .map_err(|_| SimError::Random)
}

/// Additive measurement error on a vision score (instrument and observer noise)
pub fn apply_measurement_noise<R: rand::Rng>(
    true_vision: f64,
    noise: Option<&Normal<f64>>,
    rng: &mut R,
) -> f64 {
    let epsilon = noise.map_or(0.0, |normal| normal.sample(rng));
    clamp_vision(true_vision + epsilon)
}

/// Untreated improvement is rare and muted; decline is left unchanged.
pub fn dampen_untreated_gain(change: f64) -> f64 {
    if change > 0.0 {
        change * UNTREATED_GAIN_FACTOR
    } else {
        change
    }
}

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::config::BaselineVisionParams;
use crate::error::{SimError, SimResult};

/// Percentile points per standard deviation in the linear percentile approximation.
const PERCENTILE_SLOPE: f64 = 16.67;
const MIN_PERCENTILE: f64 = 0.1;
const MAX_PERCENTILE: f64 = 99.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisionCategory {
    VeryLow,
    Low,
    Average,
    High,
    VeryHigh,
}

impl fmt::Display for VisionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VisionCategory::VeryLow => "very_low",
            VisionCategory::Low => "low",
            VisionCategory::Average => "average",
            VisionCategory::High => "high",
            VisionCategory::VeryHigh => "very_high",
        };
        f.write_str(label)
    }
}

/// Starting visual acuity distribution (ETDRS letters) for newly treated patients.
#[derive(Debug, Clone)]
pub struct BaselineVisionDistribution {
    mean: f64,
    std: f64,
    min_vision: i32,
    max_vision: i32,
    normal: Normal<f64>,
}

impl BaselineVisionDistribution {
    pub fn new(params: &BaselineVisionParams) -> SimResult<Self> {
        let normal = Normal::new(params.mean, params.std).map_err(|_| SimError::Random)?;

        Ok(Self {
            mean: params.mean,
            std: params.std,
            min_vision: params.min,
            max_vision: params.max,
            normal,
        })
    }

    pub fn sample_baseline<R: Rng>(&self, rng: &mut R) -> i32 {
        let vision = self.normal.sample(rng);
        vision.clamp(self.min_vision as f64, self.max_vision as f64) as i32
    }

    /// Approximate population percentile of a vision score.
    ///
    /// This is a linear approximation around the mean (`50 + z * 16.67`), not
    /// the normal CDF. Category thresholds are defined against it, so it is kept
    /// as is. Beyond three standard deviations the result saturates at 0.1 / 99.9.
    pub fn get_percentile(&self, vision: i32) -> f64 {
        if self.std <= 0.0 {
            return match (vision as f64).partial_cmp(&self.mean) {
                Some(std::cmp::Ordering::Less) => MIN_PERCENTILE,
                Some(std::cmp::Ordering::Greater) => MAX_PERCENTILE,
                _ => 50.0,
            };
        }

        let z = (vision as f64 - self.mean) / self.std;
        if z < -3.0 {
            MIN_PERCENTILE
        } else if z > 3.0 {
            MAX_PERCENTILE
        } else {
            (50.0 + z * PERCENTILE_SLOPE).clamp(MIN_PERCENTILE, MAX_PERCENTILE)
        }
    }

    pub fn get_category(&self, vision: i32) -> VisionCategory {
        let percentile = self.get_percentile(vision);
        if percentile < 10.0 {
            VisionCategory::VeryLow
        } else if percentile < 25.0 {
            VisionCategory::Low
        } else if percentile < 75.0 {
            VisionCategory::Average
        } else if percentile < 90.0 {
            VisionCategory::High
        } else {
            VisionCategory::VeryHigh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn distribution() -> BaselineVisionDistribution {
        BaselineVisionDistribution::new(&BaselineVisionParams::default()).unwrap()
    }

    #[test]
    fn test_samples_stay_within_bounds() {
        let dist = distribution();
        let mut rng = StdRng::seed_from_u64(42);

        let samples: Vec<i32> = (0..5000).map(|_| dist.sample_baseline(&mut rng)).collect();
        assert!(samples.iter().all(|v| (20..=90).contains(v)));

        let mean = samples.iter().sum::<i32>() as f64 / samples.len() as f64;
        assert!((mean - 70.0).abs() < 1.5, "sample mean {} too far from 70", mean);
    }

    #[test]
    fn test_percentile_linear_approximation() {
        let dist = distribution();
        assert_relative_eq!(dist.get_percentile(70), 50.0, epsilon = 1e-9);
        assert_relative_eq!(dist.get_percentile(80), 66.67, epsilon = 1e-9);
        assert_relative_eq!(dist.get_percentile(55), 24.995, epsilon = 1e-9);
    }

    #[test]
    fn test_percentile_saturates() {
        let dist = distribution();
        assert_eq!(dist.get_percentile(0), 0.1);
        assert_eq!(dist.get_percentile(100), 99.9);
        // z = -3 gives -0.01 before clamping
        assert_eq!(dist.get_percentile(40), 0.1);
    }

    #[test]
    fn test_categories() {
        let dist = distribution();
        assert_eq!(dist.get_category(70), VisionCategory::Average);
        assert_eq!(dist.get_category(45), VisionCategory::VeryLow);
        assert_eq!(dist.get_category(52), VisionCategory::Low);
        assert_eq!(dist.get_category(60), VisionCategory::Average);
        assert_eq!(dist.get_category(86), VisionCategory::High);
        assert_eq!(dist.get_category(95), VisionCategory::VeryHigh);
        assert_eq!(VisionCategory::VeryHigh.to_string(), "very_high");
    }
}

use rand::Rng;
use serde::{Deserialize, Serialize};
use log::debug;
use crate::config::{ResponseTypeConfig, PROBABILITY_TOLERANCE};
use crate::error::{SimError, SimResult};

const GOOD_DISCONTINUATION_FACTOR: f64 = 0.7;
const POOR_DISCONTINUATION_FACTOR: f64 = 1.5;

/// Monthly vision SD for an average responder, used by the growth heuristic.
const BASE_MONTHLY_SD: f64 = 1.5;

/// Latent responder class assigned once per patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAssignment {
    pub response_type: String,
    pub multiplier: f64,
}

impl ResponseAssignment {
    /// Used when heterogeneity is disabled.
    pub fn average() -> Self {
        Self {
            response_type: "average".to_string(),
            multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseTypeManager {
    types: Vec<ResponseTypeConfig>,
}

impl ResponseTypeManager {
    pub fn new(types: &[ResponseTypeConfig]) -> SimResult<Self> {
        if types.is_empty() {
            return Err(SimError::InvalidConfig(
                "At least one response type must be specified".to_string()
            ));
        }

        let sum: f64 = types.iter().map(|t| t.probability).sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(SimError::ResponseTypeProbabilities { sum });
        }

        Ok(Self { types: types.to_vec() })
    }

    /// Inverse-CDF walk over the table in insertion order.
    pub fn assign_response_type<R: Rng>(&self, rng: &mut R) -> ResponseAssignment {
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;

        for response_type in &self.types {
            cumulative += response_type.probability;
            if draw < cumulative {
                return ResponseAssignment {
                    response_type: response_type.name.clone(),
                    multiplier: response_type.multiplier,
                };
            }
        }

        // Rounding left the cumulative mass just below the draw
        match self.fallback_type() {
            Some(fallback) => {
                debug!("Response type draw {:.6} fell past the table, using {}", draw, fallback.name);
                ResponseAssignment {
                    response_type: fallback.name.clone(),
                    multiplier: fallback.multiplier,
                }
            }
            None => ResponseAssignment::average(),
        }
    }

    /// The "average" entry, or the last entry when the table has none.
    fn fallback_type(&self) -> Option<&ResponseTypeConfig> {
        self.types
            .iter()
            .find(|t| t.name == "average")
            .or_else(|| self.types.last())
    }

    pub fn adjust_discontinuation_probability(&self, base: f64, response_type: &str) -> f64 {
        match response_type {
            "good" => base * GOOD_DISCONTINUATION_FACTOR,
            "poor" => base * POOR_DISCONTINUATION_FACTOR,
            _ => base,
        }
    }

    /// Reporting heuristic: expected population SD of vision change after
    /// `months`, growing with the square root of time and widened by the spread
    /// of responder multipliers.
    pub fn calculate_expected_sd_growth(&self, months: f64) -> f64 {
        if months <= 0.0 {
            return 0.0;
        }

        let mean_multiplier: f64 = self.types.iter()
            .map(|t| t.probability * t.multiplier)
            .sum();
        let multiplier_variance: f64 = self.types.iter()
            .map(|t| t.probability * (t.multiplier - mean_multiplier).powi(2))
            .sum();

        BASE_MONTHLY_SD * months.sqrt() * (1.0 + multiplier_variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;
    use crate::config::ClinicalImprovementsConfig;

    fn manager() -> ResponseTypeManager {
        ResponseTypeManager::new(&ClinicalImprovementsConfig::default().response_types).unwrap()
    }

    #[test]
    fn test_invalid_probability_sum() {
        let types = vec![
            ResponseTypeConfig { name: "good".to_string(), probability: 0.6, multiplier: 1.2 },
            ResponseTypeConfig { name: "poor".to_string(), probability: 0.3, multiplier: 0.6 },
        ];
        assert!(matches!(
            ResponseTypeManager::new(&types),
            Err(SimError::ResponseTypeProbabilities { .. })
        ));
    }

    #[test]
    fn test_sum_within_tolerance_accepted() {
        let types = vec![
            ResponseTypeConfig { name: "good".to_string(), probability: 0.3333, multiplier: 1.2 },
            ResponseTypeConfig { name: "average".to_string(), probability: 0.3333, multiplier: 1.0 },
            ResponseTypeConfig { name: "poor".to_string(), probability: 0.3333, multiplier: 0.6 },
        ];
        assert!(ResponseTypeManager::new(&types).is_ok());
    }

    #[test]
    fn test_assignment_frequencies() {
        let manager = manager();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 10_000;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..n {
            let assignment = manager.assign_response_type(&mut rng);
            *counts.entry(assignment.response_type).or_default() += 1;
        }

        for (name, expected) in [("good", 0.30), ("average", 0.50), ("poor", 0.20)] {
            let observed = counts.get(name).copied().unwrap_or(0) as f64 / n as f64;
            assert!(
                (observed - expected).abs() < 0.03,
                "{} frequency {} differs from {}", name, observed, expected
            );
        }
    }

    #[test]
    fn test_multiplier_follows_type() {
        let manager = manager();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let assignment = manager.assign_response_type(&mut rng);
            let expected = match assignment.response_type.as_str() {
                "good" => 1.2,
                "average" => 1.0,
                "poor" => 0.6,
                other => panic!("unexpected type {}", other),
            };
            assert_eq!(assignment.multiplier, expected);
        }
    }

    #[test]
    fn test_fallback_when_mass_falls_short() {
        // Sums to 0.9995, inside tolerance, so draws above it must fall back
        let types = vec![
            ResponseTypeConfig { name: "good".to_string(), probability: 0.4995, multiplier: 1.2 },
            ResponseTypeConfig { name: "average".to_string(), probability: 0.25, multiplier: 1.0 },
            ResponseTypeConfig { name: "poor".to_string(), probability: 0.25, multiplier: 0.6 },
        ];
        let manager = ResponseTypeManager::new(&types).unwrap();
        assert_eq!(manager.fallback_type().unwrap().name, "average");

        let no_average = vec![
            ResponseTypeConfig { name: "fast".to_string(), probability: 0.5, multiplier: 1.1 },
            ResponseTypeConfig { name: "slow".to_string(), probability: 0.4995, multiplier: 0.8 },
        ];
        let manager = ResponseTypeManager::new(&no_average).unwrap();
        assert_eq!(manager.fallback_type().unwrap().name, "slow");
    }

    #[test]
    fn test_discontinuation_adjustment() {
        let manager = manager();
        assert_relative_eq!(manager.adjust_discontinuation_probability(0.2, "good"), 0.14, epsilon = 1e-12);
        assert_relative_eq!(manager.adjust_discontinuation_probability(0.2, "poor"), 0.3, epsilon = 1e-12);
        assert_eq!(manager.adjust_discontinuation_probability(0.2, "average"), 0.2);
    }

    #[test]
    fn test_sd_growth_is_sqrt_of_time() {
        let manager = manager();
        assert_eq!(manager.calculate_expected_sd_growth(0.0), 0.0);

        let at_3 = manager.calculate_expected_sd_growth(3.0);
        let at_12 = manager.calculate_expected_sd_growth(12.0);
        assert_relative_eq!(at_12 / at_3, 2.0, epsilon = 1e-12);
        assert!(at_3 > BASE_MONTHLY_SD * 3.0_f64.sqrt());
    }
}

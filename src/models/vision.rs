use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::config::{PhaseParams, VisionResponseParams};
use crate::error::{SimError, SimResult};
use crate::simulation::variability;

/// Clinical phase of the vision trajectory. Upper bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreatmentPhase {
    /// Months 0-3
    Loading,
    /// Months 3-12
    Year1,
    /// Months 12-24
    Year2,
    /// Beyond month 24
    Year3Plus,
}

impl TreatmentPhase {
    pub fn for_month(months_since_start: f64) -> Self {
        if months_since_start <= 3.0 {
            TreatmentPhase::Loading
        } else if months_since_start <= 12.0 {
            TreatmentPhase::Year1
        } else if months_since_start <= 24.0 {
            TreatmentPhase::Year2
        } else {
            TreatmentPhase::Year3Plus
        }
    }
}

impl fmt::Display for TreatmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TreatmentPhase::Loading => "loading",
            TreatmentPhase::Year1 => "year1",
            TreatmentPhase::Year2 => "year2",
            TreatmentPhase::Year3Plus => "year3plus",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct PhaseDistribution {
    params: PhaseParams,
    normal: Normal<f64>,
}

impl PhaseDistribution {
    fn new(params: PhaseParams) -> SimResult<Self> {
        let normal = Normal::new(params.mean, params.std).map_err(|_| SimError::Random)?;
        Ok(Self { params, normal })
    }
}

/// Per-visit vision change following rapid gain, continued gain, plateau and decline.
#[derive(Debug, Clone)]
pub struct ResponseBasedVisionModel {
    loading: PhaseDistribution,
    year1: PhaseDistribution,
    year2: PhaseDistribution,
    year3plus: PhaseDistribution,
    measurement_noise: Option<Normal<f64>>,
}

impl ResponseBasedVisionModel {
    pub fn new(params: &VisionResponseParams, measurement_noise_std: f64) -> SimResult<Self> {
        Ok(Self {
            loading: PhaseDistribution::new(params.loading)?,
            year1: PhaseDistribution::new(params.year1)?,
            year2: PhaseDistribution::new(params.year2)?,
            year3plus: PhaseDistribution::new(params.year3plus)?,
            measurement_noise: variability::measurement_noise(measurement_noise_std)?,
        })
    }

    fn phase(&self, phase: TreatmentPhase) -> &PhaseDistribution {
        match phase {
            TreatmentPhase::Loading => &self.loading,
            TreatmentPhase::Year1 => &self.year1,
            TreatmentPhase::Year2 => &self.year2,
            TreatmentPhase::Year3Plus => &self.year3plus,
        }
    }

    pub fn calculate_vision_change<R: Rng>(
        &self,
        months_since_start: f64,
        response_multiplier: f64,
        treatment_given: bool,
        rng: &mut R,
    ) -> f64 {
        let phase = self.phase(TreatmentPhase::for_month(months_since_start));
        let change = phase.normal.sample(rng) * response_multiplier;

        if treatment_given {
            change
        } else {
            variability::dampen_untreated_gain(change)
        }
    }

    /// Measured vision for `true_vision`, using the noise level the model was built with.
    pub fn apply_measurement_noise<R: Rng>(&self, true_vision: f64, rng: &mut R) -> f64 {
        variability::apply_measurement_noise(true_vision, self.measurement_noise.as_ref(), rng)
    }

    /// Mean cumulative change at each month from 0 to `months`, without sampling.
    pub fn get_expected_trajectory(&self, months: u32) -> BTreeMap<u32, f64> {
        let mut trajectory = BTreeMap::new();
        let mut cumulative = 0.0;
        trajectory.insert(0, cumulative);

        for month in 1..=months {
            cumulative += self.phase(TreatmentPhase::for_month(month as f64)).params.mean;
            trajectory.insert(month, cumulative);
        }

        trajectory
    }
}

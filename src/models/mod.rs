pub mod baseline;
pub mod response_types;
pub mod loading_phase;
pub mod discontinuation;
pub mod vision;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use crate::config::ClinicalImprovementsConfig;
use crate::error::SimResult;

pub use baseline::{BaselineVisionDistribution, VisionCategory};
pub use response_types::{ResponseAssignment, ResponseTypeManager};
pub use loading_phase::LoadingPhaseManager;
pub use discontinuation::{DiscontinuationCheckState, TimeBasedDiscontinuationManager};
pub use vision::{ResponseBasedVisionModel, TreatmentPhase};

pub const MIN_VISION: f64 = 0.0;
pub const MAX_VISION: f64 = 100.0;

pub const DAYS_PER_YEAR: f64 = 365.25;
pub const DAYS_PER_MONTH: f64 = DAYS_PER_YEAR / 12.0;

/// Clamp an ETDRS letter score to the valid [0, 100] range.
pub fn clamp_vision(vision: f64) -> f64 {
    vision.clamp(MIN_VISION, MAX_VISION)
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// 1-based simulation year containing `current`. Dates before the origin count as year 1.
pub fn simulation_year(first_visit: NaiveDate, current: NaiveDate) -> u32 {
    let years_elapsed = days_between(first_visit, current) as f64 / DAYS_PER_YEAR;
    (years_elapsed.floor().max(0.0) as u32) + 1
}

pub fn months_since(first_visit: NaiveDate, current: NaiveDate) -> f64 {
    (days_between(first_visit, current) as f64 / DAYS_PER_MONTH).max(0.0)
}

/// Value for `year` in a 1-based year table. Years past the last entry reuse
/// it, years before the first entry use the first. An empty table yields 0.
pub fn year_table_lookup(table: &BTreeMap<u32, f64>, year: u32) -> f64 {
    table
        .range(..=year)
        .next_back()
        .or_else(|| table.iter().next())
        .map(|(_, value)| *value)
        .unwrap_or(0.0)
}

/// Every clinical improvement component, built once per run from a validated config
/// and shared read-only by all patients.
#[derive(Debug, Clone)]
pub struct ClinicalModels {
    pub config: ClinicalImprovementsConfig,
    pub baseline: BaselineVisionDistribution,
    pub response_types: ResponseTypeManager,
    pub loading_phase: LoadingPhaseManager,
    pub discontinuation: TimeBasedDiscontinuationManager,
    pub vision: ResponseBasedVisionModel,
}

impl ClinicalModels {
    pub fn from_config(config: &ClinicalImprovementsConfig) -> SimResult<Self> {
        config.validate()?;

        Ok(Self {
            config: config.clone(),
            baseline: BaselineVisionDistribution::new(&config.baseline_vision)?,
            response_types: ResponseTypeManager::new(&config.response_types)?,
            loading_phase: LoadingPhaseManager::new(
                config.loading_phase_injections,
                config.loading_phase_interval_days,
            ),
            discontinuation: TimeBasedDiscontinuationManager::new(&config.annual_discontinuation_rates),
            vision: ResponseBasedVisionModel::new(
                &config.vision_response_params,
                config.measurement_noise_std,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_simulation_year_boundaries() {
        let start = date(2024, 1, 1);
        assert_eq!(simulation_year(start, start), 1);
        assert_eq!(simulation_year(start, date(2024, 12, 31)), 1);
        assert_eq!(simulation_year(start, date(2025, 1, 2)), 2);
        assert_eq!(simulation_year(start, date(2023, 6, 1)), 1);
    }

    #[test]
    fn test_months_since() {
        let start = date(2024, 1, 1);
        assert_eq!(months_since(start, start), 0.0);
        assert!((months_since(start, date(2025, 1, 1)) - 366.0 / DAYS_PER_MONTH).abs() < 1e-12);
        assert_eq!(months_since(start, date(2023, 1, 1)), 0.0);
    }

    #[test]
    fn test_year_table_lookup() {
        let table: BTreeMap<u32, f64> = [(2, 0.2), (4, 0.4)].into_iter().collect();
        assert_eq!(year_table_lookup(&table, 1), 0.2);
        assert_eq!(year_table_lookup(&table, 3), 0.2);
        assert_eq!(year_table_lookup(&table, 4), 0.4);
        assert_eq!(year_table_lookup(&table, 40), 0.4);
        assert_eq!(year_table_lookup(&BTreeMap::new(), 1), 0.0);
    }

    #[test]
    fn test_clamp_vision() {
        assert_eq!(clamp_vision(-4.0), 0.0);
        assert_eq!(clamp_vision(104.2), 100.0);
        assert_eq!(clamp_vision(55.5), 55.5);
    }

    #[test]
    fn test_models_reject_invalid_config() {
        let mut config = ClinicalImprovementsConfig::default();
        config.response_types[2].probability = 0.5;
        assert!(ClinicalModels::from_config(&config).is_err());
    }
}

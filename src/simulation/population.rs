use super::PatientResult;
use crate::models::{months_since, ClinicalModels};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub n_patients: usize,
    pub vision: VisionSummary,
    pub treatment: TreatmentSummary,
    pub discontinuation: DiscontinuationSummary,
    pub response_types: BTreeMap<String, ResponseTypeShare>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisionSummary {
    pub baseline_mean: f64,
    pub baseline_sd: f64,
    pub final_mean: f64,
    pub final_sd: f64,
    pub change_mean: f64,
    pub change_sd: f64,
    /// Mean months from first visit to last recorded visit.
    pub follow_up_months: f64,
    /// Heuristic SD of change at `follow_up_months` from the responder table.
    pub expected_change_sd: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TreatmentSummary {
    pub injections_mean: f64,
    pub injections_sd: f64,
    pub visits_mean: f64,
    pub retreated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscontinuationSummary {
    pub discontinued: usize,
    pub rate: f64,
    /// Observed cumulative rate by simulation year.
    pub observed_cumulative: BTreeMap<u32, f64>,
    /// Analytic cumulative rate from the annual probability table.
    pub expected_cumulative: BTreeMap<u32, f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseTypeShare {
    pub count: usize,
    pub fraction: f64,
}

impl PopulationSummary {
    pub fn from_results(
        results: &[PatientResult],
        models: &ClinicalModels,
    ) -> Self {
        let n = results.len();

        let baseline_values: Vec<f64> = results.iter()
            .map(|r| r.baseline_vision as f64)
            .collect();
        let final_values: Vec<f64> = results.iter()
            .map(|r| r.final_vision() as f64)
            .collect();
        let change_values: Vec<f64> = results.iter()
            .map(|r| r.vision_change_from_baseline() as f64)
            .collect();
        let injection_values: Vec<f64> = results.iter()
            .map(|r| r.injection_count() as f64)
            .collect();
        let visit_values: Vec<f64> = results.iter()
            .map(|r| r.visits.len() as f64)
            .collect();
        let follow_up_values: Vec<f64> = results.iter()
            .filter_map(|r| r.visits.last().map(|v| months_since(r.first_visit_date, v.date)))
            .collect();
        let follow_up_months = mean(&follow_up_values);

        let discontinuation_years: Vec<u32> = results.iter()
            .filter_map(|r| r.discontinuation_year())
            .collect();
        let expected_cumulative = models.discontinuation.get_expected_rates();
        let observed_cumulative = expected_cumulative.keys()
            .map(|&year| {
                let count = discontinuation_years.iter().filter(|&&y| y <= year).count();
                (year, fraction(count, n))
            })
            .collect();

        let mut response_counts: BTreeMap<String, usize> = BTreeMap::new();
        for result in results {
            *response_counts.entry(result.response_type.clone()).or_default() += 1;
        }
        let response_types = response_counts.into_iter()
            .map(|(name, count)| (name, ResponseTypeShare { count, fraction: fraction(count, n) }))
            .collect();

        Self {
            n_patients: n,
            vision: VisionSummary {
                baseline_mean: mean(&baseline_values),
                baseline_sd: std_dev(&baseline_values),
                final_mean: mean(&final_values),
                final_sd: std_dev(&final_values),
                change_mean: mean(&change_values),
                change_sd: std_dev(&change_values),
                follow_up_months,
                expected_change_sd: models.response_types.calculate_expected_sd_growth(follow_up_months),
            },
            treatment: TreatmentSummary {
                injections_mean: mean(&injection_values),
                injections_sd: std_dev(&injection_values),
                visits_mean: mean(&visit_values),
                retreated: results.iter().filter(|r| r.was_retreated()).count(),
            },
            discontinuation: DiscontinuationSummary {
                discontinued: discontinuation_years.len(),
                rate: fraction(discontinuation_years.len(), n),
                observed_cumulative,
                expected_cumulative,
            },
            response_types,
        }
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        let mean_val = mean(values);
        let variance = values.iter()
            .map(|v| (v - mean_val).powi(2))
            .sum::<f64>() / (values.len() - 1) as f64;
        variance.sqrt()
    }
}

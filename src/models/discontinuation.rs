use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use log::debug;
use super::{simulation_year, year_table_lookup};

/// Last simulation year already checked for one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscontinuationCheckState {
    pub last_checked_year: Option<u32>,
}

impl DiscontinuationCheckState {
    pub fn is_checked(&self, year: u32) -> bool {
        matches!(self.last_checked_year, Some(last) if last >= year)
    }
}

/// Yearly stochastic hazard of stopping treatment.
///
/// Patients are checked at most once per simulation year. Checking at every
/// visit would compound the hazard and overshoot the configured annual rates.
#[derive(Debug, Clone)]
pub struct TimeBasedDiscontinuationManager {
    annual_probabilities: BTreeMap<u32, f64>,
    checks: HashMap<String, DiscontinuationCheckState>,
}

impl TimeBasedDiscontinuationManager {
    pub fn new(annual_probabilities: &BTreeMap<u32, f64>) -> Self {
        Self {
            annual_probabilities: annual_probabilities.clone(),
            checks: HashMap::new(),
        }
    }

    /// Annual probability for `year`; years past the table reuse the last configured rate.
    pub fn annual_probability(&self, year: u32) -> f64 {
        year_table_lookup(&self.annual_probabilities, year)
    }

    /// Run the hazard draw for `year` unless `state` shows it was already checked.
    ///
    /// Returns the discontinuation reason when the patient stops.
    pub fn check_year<R: Rng>(
        &self,
        state: &mut DiscontinuationCheckState,
        year: u32,
        rng: &mut R,
    ) -> Option<String> {
        if state.is_checked(year) {
            return None;
        }
        state.last_checked_year = Some(year);

        let probability = self.annual_probability(year);
        let draw: f64 = rng.gen();
        if draw < probability {
            Some(format!(
                "Time-based discontinuation in year {} (annual probability {:.1}%)",
                year,
                probability * 100.0
            ))
        } else {
            None
        }
    }

    /// Yearly discontinuation check for a patient tracked by this manager.
    ///
    /// `Some(reason)` means the patient discontinues now. Already discontinued
    /// patients, patients without a first visit and years already checked all
    /// yield `None`.
    pub fn should_discontinue<R: Rng>(
        &mut self,
        patient_id: &str,
        current_date: NaiveDate,
        first_visit_date: Option<NaiveDate>,
        is_already_discontinued: bool,
        rng: &mut R,
    ) -> Option<String> {
        if is_already_discontinued {
            return None;
        }

        let first_visit_date = first_visit_date?;
        let year = simulation_year(first_visit_date, current_date);

        // Temporarily take the state out so the map and &self can be used together
        let mut state = self.checks.remove(patient_id).unwrap_or_default();
        let decision = self.check_year(&mut state, year, rng);
        self.checks.insert(patient_id.to_string(), state);

        if let Some(reason) = &decision {
            debug!("Patient {} discontinued: {}", patient_id, reason);
        }
        decision
    }

    pub fn check_state(&self, patient_id: &str) -> Option<&DiscontinuationCheckState> {
        self.checks.get(patient_id)
    }

    /// Analytic cumulative discontinuation rate by the end of `year`.
    pub fn get_cumulative_rate(&self, year: u32) -> f64 {
        (1..=year).fold(0.0, |cumulative, y| {
            cumulative + (1.0 - cumulative) * self.annual_probability(y)
        })
    }

    /// Cumulative rates for every configured year.
    pub fn get_expected_rates(&self) -> BTreeMap<u32, f64> {
        let last_year = self.annual_probabilities.keys().next_back().copied().unwrap_or(0);
        (1..=last_year)
            .map(|year| (year, self.get_cumulative_rate(year)))
            .collect()
    }
}

use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use log::{debug, warn};
use crate::models::{
    clamp_vision, months_since, simulation_year, ClinicalModels, DiscontinuationCheckState,
    ResponseAssignment, VisionCategory,
};
use super::{DiscontinuationType, Patient, TreatmentStatus};

/// Read-only snapshot of everything the wrapper tracks for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicalSummary {
    pub patient_id: String,
    pub response_type: String,
    pub response_multiplier: f64,
    pub baseline_vision: i32,
    pub baseline_percentile: f64,
    pub baseline_category: VisionCategory,
    pub true_vision: f64,
    pub measured_vision: i32,
    pub injection_count: u32,
    pub loading_injections_given: u32,
    pub in_loading_phase: bool,
    pub status: TreatmentStatus,
    pub is_discontinued: bool,
    pub discontinuation_reason: Option<String>,
    pub last_discontinuation_check_year: Option<u32>,
    pub enabled_features: Vec<String>,
}

/// Applies the clinical improvement models to one patient.
///
/// The wrapper owns the patient record and is the only place its vision,
/// injection count and treatment status change during a simulation. The
/// component models are shared by reference across all patients of a run.
#[derive(Debug)]
pub struct PatientStateWrapper<'a> {
    patient: Patient,
    models: &'a ClinicalModels,
    response: ResponseAssignment,
    /// Noise-free vision; the patient's `current_vision` is the measured value.
    true_vision: f64,
    loading_injections_given: u32,
    discontinuation_check: DiscontinuationCheckState,
}

impl<'a> PatientStateWrapper<'a> {
    pub fn new<R: Rng>(mut patient: Patient, models: &'a ClinicalModels, rng: &mut R) -> Self {
        let config = &models.config;

        let response = if config.enable_response_heterogeneity {
            models.response_types.assign_response_type(rng)
        } else {
            ResponseAssignment::average()
        };

        if config.enable_baseline_distribution {
            let baseline = models.baseline.sample_baseline(rng);
            patient.reset_baseline(baseline);
        }

        debug!(
            "Patient {}: response type {} (x{:.2}), baseline {} letters",
            patient.id(),
            response.response_type,
            response.multiplier,
            patient.baseline_vision()
        );

        let true_vision = patient.current_vision() as f64;
        Self {
            patient,
            models,
            response,
            true_vision,
            loading_injections_given: 0,
            discontinuation_check: DiscontinuationCheckState::default(),
        }
    }

    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    pub fn response(&self) -> &ResponseAssignment {
        &self.response
    }

    pub fn true_vision(&self) -> f64 {
        self.true_vision
    }

    pub fn is_in_loading_phase(&self) -> bool {
        self.models.config.enable_loading_phase
            && self.models.loading_phase.is_in_loading_phase(self.patient.injection_count())
    }

    /// Days until the next injection visit.
    pub fn get_next_injection_interval(&self, current_date: NaiveDate) -> u32 {
        let protocol_interval = self.patient.current_interval_days;
        if !self.models.config.enable_loading_phase {
            return protocol_interval;
        }

        let injection_count = self.patient.injection_count();
        let interval = self.models.loading_phase.get_interval(injection_count, protocol_interval);
        if self.models.loading_phase.is_in_loading_phase(injection_count) {
            debug!(
                "Patient {} loading phase on {}: {} of {} injections, next in {} days",
                self.patient.id(),
                current_date,
                injection_count,
                self.models.loading_phase.loading_injections,
                interval
            );
        }
        interval
    }

    /// Yearly discontinuation check; moves the patient to `Discontinued` when it fires.
    pub fn check_time_based_discontinuation<R: Rng>(
        &mut self,
        current_date: NaiveDate,
        rng: &mut R,
    ) -> bool {
        if !self.models.config.enable_time_based_discontinuation {
            return false;
        }
        if self.patient.status() != &TreatmentStatus::Active {
            return false;
        }

        let Some(first_visit_date) = self.patient.first_visit_date else {
            warn!("Patient {} has no first visit date, skipping discontinuation check", self.patient.id());
            return false;
        };

        let year = simulation_year(first_visit_date, current_date);
        let Some(reason) = self.models.discontinuation.check_year(&mut self.discontinuation_check, year, rng) else {
            return false;
        };

        debug!("Patient {} discontinued on {}: {}", self.patient.id(), current_date, reason);
        self.patient.discontinue(current_date, reason, DiscontinuationType::TimeBased)
    }

    /// Vision change for a visit on `current_date`. Treatment is assumed given
    /// unless the patient is currently discontinued.
    pub fn calculate_vision_change<R: Rng>(&self, current_date: NaiveDate, rng: &mut R) -> f64 {
        if !self.models.config.enable_response_based_vision {
            return 0.0;
        }

        let Some(first_visit_date) = self.patient.first_visit_date else {
            warn!("Patient {} has no first visit date, no vision change applied", self.patient.id());
            return 0.0;
        };

        let months = months_since(first_visit_date, current_date);
        self.models.vision.calculate_vision_change(
            months,
            self.response.multiplier,
            self.patient.is_on_treatment(),
            rng,
        )
    }

    /// Applies a vision change and returns the measured vision.
    pub fn update_vision<R: Rng>(&mut self, vision_change: f64, rng: &mut R) -> i32 {
        self.true_vision = clamp_vision(self.true_vision + vision_change);

        let measured = self.models.vision.apply_measurement_noise(self.true_vision, rng);
        self.patient.set_measured_vision(measured as i32);
        self.patient.current_vision()
    }

    /// One call per injection actually given.
    pub fn record_injection(&mut self, date: NaiveDate) {
        if self.is_in_loading_phase() {
            self.loading_injections_given += 1;
        }
        self.patient.record_injection(date);
    }

    /// Resume treatment after discontinuation.
    pub fn retreat(&mut self, date: NaiveDate) -> bool {
        let resumed = self.patient.retreat(date);
        if resumed {
            debug!("Patient {} retreated on {}", self.patient.id(), date);
        }
        resumed
    }

    pub fn get_clinical_summary(&self) -> ClinicalSummary {
        let baseline = self.patient.baseline_vision();
        ClinicalSummary {
            patient_id: self.patient.id().to_string(),
            response_type: self.response.response_type.clone(),
            response_multiplier: self.response.multiplier,
            baseline_vision: baseline,
            baseline_percentile: self.models.baseline.get_percentile(baseline),
            baseline_category: self.models.baseline.get_category(baseline),
            true_vision: self.true_vision,
            measured_vision: self.patient.current_vision(),
            injection_count: self.patient.injection_count(),
            loading_injections_given: self.loading_injections_given,
            in_loading_phase: self.is_in_loading_phase(),
            status: self.patient.status().clone(),
            is_discontinued: self.patient.is_discontinued(),
            discontinuation_reason: self.patient.discontinuation_reason().map(str::to_string),
            last_discontinuation_check_year: self.discontinuation_check.last_checked_year,
            enabled_features: self.models.config
                .enabled_features()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

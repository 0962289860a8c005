pub mod population;
pub mod individual;
pub mod variability;
use crate::config::Config;
use crate::dosing::TreatmentProtocol;
use crate::error::SimResult;
use crate::models::{days_between, ClinicalModels};
use crate::patient::{Patient, PatientStateWrapper};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use log::{info, debug};

pub use population::*;
pub use individual::*;

/// Runs the visit loop for a population of patients.
///
/// A single seeded RNG drives every draw and patients are simulated in id
/// order, so a seed reproduces a run exactly.
pub struct Simulator {
    config: Config,
    models: ClinicalModels,
    protocol: TreatmentProtocol,
    rng: StdRng,
}

impl Simulator {
    pub fn new(config: Config, seed: Option<u64>) -> SimResult<Self> {
        config.validate()?;
        let models = ClinicalModels::from_config(&config.clinical_improvements)?;
        let protocol = TreatmentProtocol::from_config(&config.protocol, &config.retreatment)?;

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self { config, models, protocol, rng })
    }

    pub fn models(&self) -> &ClinicalModels {
        &self.models
    }

    pub fn protocol(&self) -> &TreatmentProtocol {
        &self.protocol
    }

    pub fn simulate_population(&mut self, n_patients: usize) -> SimResult<Vec<PatientResult>> {
        info!(
            "Starting population simulation of protocol {} for {} patients (improvements: {:?})",
            self.config.protocol.name,
            n_patients,
            self.models.config.enabled_features()
        );

        let mut results = Vec::with_capacity(n_patients);

        for index in 1..=n_patients {
            if index % 100 == 0 || index <= 10 {
                info!("Simulating patient {}/{}", index, n_patients);
            }

            let patient_result = self.simulate_individual(index)?;
            results.push(patient_result);
        }

        info!("Population simulation completed");
        Ok(results)
    }

    fn simulate_individual(&mut self, index: usize) -> SimResult<PatientResult> {
        let patient_id = format!("P{:05}", index);
        debug!("Simulating patient {}", patient_id);

        let protocol = &self.protocol;
        let rng = &mut self.rng;

        let mut patient = Patient::new(patient_id, self.config.simulation.default_baseline_vision);
        patient.first_visit_date = Some(protocol.start_date);
        patient.current_interval_days = protocol.interval_days;

        let mut wrapper = PatientStateWrapper::new(patient, &self.models, rng);
        let baseline_vision = wrapper.patient().baseline_vision();

        let mut visits = Vec::new();
        let mut date = protocol.start_date;

        while protocol.is_within_horizon(date) {
            let day = days_between(protocol.start_date, date);

            if let Some(discontinued_on) = wrapper.patient().discontinuation_date() {
                let Some(monitoring_interval) = protocol.monitoring_interval_days else {
                    break;
                };

                let vision_change = wrapper.calculate_vision_change(date, rng);
                let vision = wrapper.update_vision(vision_change, rng);

                let probability = protocol.retreatment_probability(discontinued_on, date);
                let retreated = probability > 0.0
                    && rng.gen::<f64>() < probability
                    && wrapper.retreat(date);

                let interval_days = if retreated {
                    wrapper.record_injection(date);
                    wrapper.get_next_injection_interval(date)
                } else {
                    monitoring_interval
                };

                visits.push(VisitRecord {
                    date,
                    day,
                    phase: VisitPhase::Monitoring,
                    interval_days,
                    vision,
                    true_vision: wrapper.true_vision(),
                    vision_change,
                    injection_given: retreated,
                    is_discontinuation_visit: false,
                    discontinuation_reason: None,
                    discontinuation_type: None,
                    is_retreatment_visit: retreated,
                });

                match protocol.next_visit(date, interval_days) {
                    Some(next) => date = next,
                    None => break,
                }
                continue;
            }

            let phase = if wrapper.is_in_loading_phase() {
                VisitPhase::Loading
            } else {
                VisitPhase::Maintenance
            };

            let vision_change = wrapper.calculate_vision_change(date, rng);
            let vision = wrapper.update_vision(vision_change, rng);
            wrapper.record_injection(date);

            let discontinued = wrapper.check_time_based_discontinuation(date, rng);
            let interval_days = if discontinued {
                protocol.monitoring_interval_days.unwrap_or(0)
            } else {
                wrapper.get_next_injection_interval(date)
            };

            let patient = wrapper.patient();
            visits.push(VisitRecord {
                date,
                day,
                phase,
                interval_days,
                vision,
                true_vision: wrapper.true_vision(),
                vision_change,
                injection_given: true,
                is_discontinuation_visit: discontinued,
                discontinuation_reason: patient.discontinuation_reason().map(str::to_string),
                discontinuation_type: patient.discontinuation_type(),
                is_retreatment_visit: false,
            });

            if interval_days == 0 {
                break;
            }
            match protocol.next_visit(date, interval_days) {
                Some(next) => date = next,
                None => break,
            }
        }

        let summary = wrapper.get_clinical_summary();
        let response = wrapper.response().clone();

        Ok(PatientResult {
            patient_id: summary.patient_id.clone(),
            response_type: response.response_type,
            response_multiplier: response.multiplier,
            baseline_vision,
            first_visit_date: protocol.start_date,
            visits,
            summary,
        })
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::models::simulation_year;
use crate::patient::{ClinicalSummary, DiscontinuationType};

#[derive(Debug, Clone, Serialize)]
pub struct PatientResult {
    pub patient_id: String,
    pub response_type: String,
    pub response_multiplier: f64,
    pub baseline_vision: i32,
    pub first_visit_date: NaiveDate,
    pub visits: Vec<VisitRecord>,
    pub summary: ClinicalSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitPhase {
    Loading,
    Maintenance,
    Monitoring,
}

impl fmt::Display for VisitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VisitPhase::Loading => "loading",
            VisitPhase::Maintenance => "maintenance",
            VisitPhase::Monitoring => "monitoring",
        };
        f.write_str(label)
    }
}

/// One clinic visit as consumed by the persistence and plotting layers.
#[derive(Debug, Clone, Serialize)]
pub struct VisitRecord {
    pub date: NaiveDate,
    pub day: i64,
    pub phase: VisitPhase,
    /// Days until the next scheduled visit, 0 when the patient leaves follow-up.
    pub interval_days: u32,
    pub vision: i32,
    pub true_vision: f64,
    pub vision_change: f64,
    pub injection_given: bool,
    pub is_discontinuation_visit: bool,
    pub discontinuation_reason: Option<String>,
    pub discontinuation_type: Option<DiscontinuationType>,
    pub is_retreatment_visit: bool,
}

impl PatientResult {
    pub fn injection_count(&self) -> usize {
        self.visits.iter().filter(|v| v.injection_given).count()
    }

    pub fn final_vision(&self) -> i32 {
        self.visits.last()
            .map(|v| v.vision)
            .unwrap_or(self.baseline_vision)
    }

    pub fn vision_change_from_baseline(&self) -> i32 {
        self.final_vision() - self.baseline_vision
    }

    pub fn best_vision(&self) -> i32 {
        self.visits.iter()
            .map(|v| v.vision)
            .fold(self.baseline_vision, i32::max)
    }

    pub fn discontinuation_visit(&self) -> Option<&VisitRecord> {
        self.visits.iter().find(|v| v.is_discontinuation_visit)
    }

    /// 1-based simulation year of discontinuation, if any.
    pub fn discontinuation_year(&self) -> Option<u32> {
        self.discontinuation_visit()
            .map(|visit| simulation_year(self.first_visit_date, visit.date))
    }

    pub fn was_retreated(&self) -> bool {
        self.visits.iter().any(|v| v.is_retreatment_visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::TreatmentStatus;

    fn visit(day: i64, vision: i32, injection_given: bool) -> VisitRecord {
        VisitRecord {
            date: start() + chrono::Duration::days(day),
            day,
            phase: VisitPhase::Maintenance,
            interval_days: 56,
            vision,
            true_vision: vision as f64,
            vision_change: 0.0,
            injection_given,
            is_discontinuation_visit: false,
            discontinuation_reason: None,
            discontinuation_type: None,
            is_retreatment_visit: false,
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn result(visits: Vec<VisitRecord>) -> PatientResult {
        PatientResult {
            patient_id: "P00001".to_string(),
            response_type: "average".to_string(),
            response_multiplier: 1.0,
            baseline_vision: 55,
            first_visit_date: start(),
            visits,
            summary: ClinicalSummary {
                patient_id: "P00001".to_string(),
                response_type: "average".to_string(),
                response_multiplier: 1.0,
                baseline_vision: 55,
                baseline_percentile: 50.0,
                baseline_category: crate::models::VisionCategory::Average,
                true_vision: 55.0,
                measured_vision: 55,
                injection_count: 0,
                loading_injections_given: 0,
                in_loading_phase: false,
                status: TreatmentStatus::Active,
                is_discontinued: false,
                discontinuation_reason: None,
                last_discontinuation_check_year: None,
                enabled_features: Vec::new(),
            },
        }
    }

    #[test]
    fn test_visit_statistics() {
        let result = result(vec![visit(0, 57, true), visit(28, 66, true), visit(56, 61, false)]);

        assert_eq!(result.injection_count(), 2);
        assert_eq!(result.final_vision(), 61);
        assert_eq!(result.vision_change_from_baseline(), 6);
        assert_eq!(result.best_vision(), 66);
        assert!(result.discontinuation_year().is_none());
        assert!(!result.was_retreated());
    }

    #[test]
    fn test_discontinuation_year() {
        let mut stop = visit(400, 50, false);
        stop.is_discontinuation_visit = true;
        stop.discontinuation_type = Some(DiscontinuationType::TimeBased);
        let result = result(vec![visit(0, 55, true), stop]);

        assert_eq!(result.discontinuation_year(), Some(2));
    }

    #[test]
    fn test_empty_visits() {
        let result = result(Vec::new());
        assert_eq!(result.final_vision(), 55);
        assert_eq!(result.best_vision(), 55);
    }
}

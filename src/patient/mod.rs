pub mod wrapper;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use wrapper::{ClinicalSummary, PatientStateWrapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscontinuationType {
    /// Yearly hazard check fired
    TimeBased,
}

impl fmt::Display for DiscontinuationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscontinuationType::TimeBased => f.write_str("time_based"),
        }
    }
}

/// Treatment status of a patient. Discontinuation details only exist in the
/// `Discontinued` variant, so a discontinued patient always carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TreatmentStatus {
    Active,
    Discontinued {
        date: NaiveDate,
        reason: String,
        kind: DiscontinuationType,
    },
    Retreated {
        date: NaiveDate,
        from: DiscontinuationType,
        previous_reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    id: String,
    baseline_vision: i32,
    current_vision: i32,
    injection_count: u32,
    injection_dates: Vec<NaiveDate>,
    pub first_visit_date: Option<NaiveDate>,
    /// Protocol interval used once any loading phase is over.
    pub current_interval_days: u32,
    status: TreatmentStatus,
}

fn clamp_letters(vision: i32) -> i32 {
    vision.clamp(0, 100)
}

impl Patient {
    pub fn new(id: impl Into<String>, baseline_vision: i32) -> Self {
        let baseline_vision = clamp_letters(baseline_vision);
        Self {
            id: id.into(),
            baseline_vision,
            current_vision: baseline_vision,
            injection_count: 0,
            injection_dates: Vec::new(),
            first_visit_date: None,
            current_interval_days: 0,
            status: TreatmentStatus::Active,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn baseline_vision(&self) -> i32 {
        self.baseline_vision
    }

    /// Last measured (possibly noisy) vision.
    pub fn current_vision(&self) -> i32 {
        self.current_vision
    }

    pub fn injection_count(&self) -> u32 {
        self.injection_count
    }

    pub fn injection_dates(&self) -> &[NaiveDate] {
        &self.injection_dates
    }

    pub fn status(&self) -> &TreatmentStatus {
        &self.status
    }

    pub fn is_discontinued(&self) -> bool {
        matches!(self.status, TreatmentStatus::Discontinued { .. })
    }

    /// Receiving injections, either never stopped or retreated.
    pub fn is_on_treatment(&self) -> bool {
        !self.is_discontinued()
    }

    pub fn discontinuation_date(&self) -> Option<NaiveDate> {
        match &self.status {
            TreatmentStatus::Discontinued { date, .. } => Some(*date),
            _ => None,
        }
    }

    pub fn discontinuation_reason(&self) -> Option<&str> {
        match &self.status {
            TreatmentStatus::Discontinued { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn discontinuation_type(&self) -> Option<DiscontinuationType> {
        match &self.status {
            TreatmentStatus::Discontinued { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Replaces the baseline before any visit has been simulated.
    pub(crate) fn reset_baseline(&mut self, baseline_vision: i32) {
        self.baseline_vision = clamp_letters(baseline_vision);
        self.current_vision = self.baseline_vision;
    }

    pub(crate) fn set_measured_vision(&mut self, vision: i32) {
        self.current_vision = clamp_letters(vision);
    }

    pub(crate) fn record_injection(&mut self, date: NaiveDate) {
        self.injection_count += 1;
        self.injection_dates.push(date);
    }

    /// Moves an active patient to `Discontinued`. Returns false if the
    /// patient was not active.
    pub(crate) fn discontinue(
        &mut self,
        date: NaiveDate,
        reason: String,
        kind: DiscontinuationType,
    ) -> bool {
        if self.status != TreatmentStatus::Active {
            return false;
        }
        self.status = TreatmentStatus::Discontinued { date, reason, kind };
        true
    }

    /// Resumes treatment for a discontinued patient. Returns false otherwise.
    pub(crate) fn retreat(&mut self, date: NaiveDate) -> bool {
        let TreatmentStatus::Discontinued { reason, kind, .. } = &self.status else {
            return false;
        };
        self.status = TreatmentStatus::Retreated {
            date,
            from: *kind,
            previous_reason: reason.clone(),
        };
        true
    }
}

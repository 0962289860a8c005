use serde::{Deserialize, Serialize};
use std::path::Path;
use std::collections::BTreeMap;
use chrono::NaiveDate;
use crate::error::{SimError, SimResult};

/// Tolerance applied when checking that response type probabilities sum to one.
pub const PROBABILITY_TOLERANCE: f64 = 0.001;

/// Upper bound for any visit interval.
pub const MAX_INTERVAL_DAYS: u32 = 3650;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub clinical_improvements: ClinicalImprovementsConfig,
    pub protocol: ProtocolConfig,
    pub retreatment: RetreatmentConfig,
    pub simulation: SimulationConfig,
}

/// Feature flags and parameters for the clinical improvement models.
///
/// Each flag gates exactly one component. A disabled component behaves as a
/// no-op so that an all-false config reproduces the plain protocol simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalImprovementsConfig {
    pub enable_loading_phase: bool,
    pub enable_time_based_discontinuation: bool,
    pub enable_response_based_vision: bool,
    pub enable_baseline_distribution: bool,
    pub enable_response_heterogeneity: bool,

    pub loading_phase_injections: u32,
    pub loading_phase_interval_days: u32,

    /// Probability of discontinuing during year N given still active at its start.
    pub annual_discontinuation_rates: BTreeMap<u32, f64>,

    pub vision_response_params: VisionResponseParams,
    pub baseline_vision: BaselineVisionParams,

    /// Walked in order during assignment, so order matters.
    pub response_types: Vec<ResponseTypeConfig>,

    pub measurement_noise_std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseParams {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionResponseParams {
    pub loading: PhaseParams,
    pub year1: PhaseParams,
    pub year2: PhaseParams,
    pub year3plus: PhaseParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineVisionParams {
    pub mean: f64,
    pub std: f64,
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTypeConfig {
    pub name: String,
    pub probability: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub name: String,
    /// Maintenance interval once any loading phase is complete.
    pub interval_days: u32,
    pub start_date: NaiveDate,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetreatmentConfig {
    pub enabled: bool,
    pub monitoring_interval_days: u32,
    /// Chance of resuming treatment at each monitoring visit, keyed by the
    /// 1-based year since discontinuation. Later years reuse the last entry.
    pub probabilities: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Used when the baseline distribution is disabled.
    pub default_baseline_vision: i32,
    pub n_patients: usize,
}

impl Default for ClinicalImprovementsConfig {
    fn default() -> Self {
        let annual_discontinuation_rates = [
            (1, 0.125),
            (2, 0.171),
            (3, 0.166),
            (4, 0.132),
            (5, 0.143),
        ]
        .into_iter()
        .collect();

        Self {
            enable_loading_phase: false,
            enable_time_based_discontinuation: false,
            enable_response_based_vision: false,
            enable_baseline_distribution: false,
            enable_response_heterogeneity: false,
            loading_phase_injections: 3,
            loading_phase_interval_days: 28,
            annual_discontinuation_rates,
            vision_response_params: VisionResponseParams::default(),
            baseline_vision: BaselineVisionParams::default(),
            response_types: vec![
                ResponseTypeConfig { name: "good".to_string(), probability: 0.30, multiplier: 1.2 },
                ResponseTypeConfig { name: "average".to_string(), probability: 0.50, multiplier: 1.0 },
                ResponseTypeConfig { name: "poor".to_string(), probability: 0.20, multiplier: 0.6 },
            ],
            measurement_noise_std: 5.0,
        }
    }
}

impl Default for VisionResponseParams {
    fn default() -> Self {
        Self {
            loading: PhaseParams { mean: 5.0, std: 2.5 },
            year1: PhaseParams { mean: 1.0, std: 1.5 },
            year2: PhaseParams { mean: 0.0, std: 1.0 },
            year3plus: PhaseParams { mean: -0.5, std: 1.0 },
        }
    }
}

impl Default for BaselineVisionParams {
    fn default() -> Self {
        Self {
            mean: 70.0,
            std: 10.0,
            min: 20,
            max: 90,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            name: "eylea_fixed_8_weekly".to_string(),
            interval_days: 56,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            duration_days: 1826,
        }
    }
}

impl Default for RetreatmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            monitoring_interval_days: 84,
            probabilities: [(1, 0.05), (2, 0.03), (3, 0.02)].into_iter().collect(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_baseline_vision: 55,
            n_patients: 100,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.clinical_improvements.validate()?;

        if !(1..=MAX_INTERVAL_DAYS).contains(&self.protocol.interval_days) {
            return Err(SimError::InvalidConfig(
                format!("Protocol interval must be between 1 and {} days", MAX_INTERVAL_DAYS)
            ));
        }

        if self.protocol.duration_days == 0 {
            return Err(SimError::InvalidConfig(
                "Protocol duration must be at least one day".to_string()
            ));
        }

        if self.retreatment.enabled {
            self.retreatment.validate()?;
        }

        if !(0..=100).contains(&self.simulation.default_baseline_vision) {
            return Err(SimError::Validation(
                "Default baseline vision must be within 0-100 letters".to_string()
            ));
        }

        Ok(())
    }
}

impl RetreatmentConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(1..=MAX_INTERVAL_DAYS).contains(&self.monitoring_interval_days) {
            return Err(SimError::InvalidConfig(
                format!("Monitoring interval must be between 1 and {} days", MAX_INTERVAL_DAYS)
            ));
        }

        if self.probabilities.is_empty() {
            return Err(SimError::InvalidConfig(
                "At least one retreatment probability must be specified".to_string()
            ));
        }

        for (year, probability) in &self.probabilities {
            if *year == 0 {
                return Err(SimError::InvalidConfig(
                    "Retreatment years are 1-based".to_string()
                ));
            }
            if !(0.0..=1.0).contains(probability) {
                return Err(SimError::Validation(
                    format!("Retreatment probability for year {} must be within [0, 1]", year)
                ));
            }
        }

        Ok(())
    }
}

impl ClinicalImprovementsConfig {
    pub fn enable_all(&mut self) {
        self.set_all(true);
    }

    pub fn disable_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, enabled: bool) {
        self.enable_loading_phase = enabled;
        self.enable_time_based_discontinuation = enabled;
        self.enable_response_based_vision = enabled;
        self.enable_baseline_distribution = enabled;
        self.enable_response_heterogeneity = enabled;
    }

    /// Names of the enabled improvements, in declaration order.
    pub fn enabled_features(&self) -> Vec<&'static str> {
        [
            (self.enable_loading_phase, "loading_phase"),
            (self.enable_time_based_discontinuation, "time_based_discontinuation"),
            (self.enable_response_based_vision, "response_based_vision"),
            (self.enable_baseline_distribution, "baseline_distribution"),
            (self.enable_response_heterogeneity, "response_heterogeneity"),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .collect()
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(1..=MAX_INTERVAL_DAYS).contains(&self.loading_phase_interval_days) {
            return Err(SimError::InvalidConfig(
                format!("Loading phase interval must be between 1 and {} days", MAX_INTERVAL_DAYS)
            ));
        }

        if self.annual_discontinuation_rates.is_empty() {
            return Err(SimError::InvalidConfig(
                "At least one annual discontinuation rate must be specified".to_string()
            ));
        }

        for (year, rate) in &self.annual_discontinuation_rates {
            if *year == 0 {
                return Err(SimError::InvalidConfig(
                    "Discontinuation years are 1-based".to_string()
                ));
            }
            if !(0.0..=1.0).contains(rate) {
                return Err(SimError::Validation(
                    format!("Discontinuation rate for year {} must be within [0, 1]", year)
                ));
            }
        }

        let phases = [
            ("loading", &self.vision_response_params.loading),
            ("year1", &self.vision_response_params.year1),
            ("year2", &self.vision_response_params.year2),
            ("year3plus", &self.vision_response_params.year3plus),
        ];
        for (phase, params) in phases {
            if !params.mean.is_finite() || !params.std.is_finite() || params.std < 0.0 {
                return Err(SimError::Validation(
                    format!("Vision response parameters for phase {} are invalid", phase)
                ));
            }
        }

        let baseline = &self.baseline_vision;
        if baseline.std < 0.0 || !baseline.std.is_finite() {
            return Err(SimError::Validation(
                "Baseline vision std must be non-negative".to_string()
            ));
        }
        if baseline.min > baseline.max || baseline.min < 0 || baseline.max > 100 {
            return Err(SimError::Validation(
                format!("Baseline vision bounds [{}, {}] are invalid", baseline.min, baseline.max)
            ));
        }

        if self.response_types.is_empty() {
            return Err(SimError::InvalidConfig(
                "At least one response type must be specified".to_string()
            ));
        }
        if let Some(rt) = self.response_types.iter().find(|rt| rt.multiplier <= 0.0) {
            return Err(SimError::Validation(
                format!("Response type {} must have a positive multiplier", rt.name)
            ));
        }
        let sum: f64 = self.response_types.iter().map(|rt| rt.probability).sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(SimError::ResponseTypeProbabilities { sum });
        }

        if self.measurement_noise_std < 0.0 || !self.measurement_noise_std.is_finite() {
            return Err(SimError::Validation(
                "Measurement noise std must be non-negative".to_string()
            ));
        }

        Ok(())
    }
}

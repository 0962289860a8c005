use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use crate::config::{ProtocolConfig, RetreatmentConfig};
use crate::error::{SimError, SimResult};
use crate::models::{simulation_year, year_table_lookup};

/// Visit schedule for the treatment protocol: maintenance interval, horizon
/// and the monitoring cadence used after discontinuation.
#[derive(Debug, Clone)]
pub struct TreatmentProtocol {
    pub interval_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monitoring_interval_days: Option<u32>,
    /// Per-visit retreatment chance by year since discontinuation. Empty when
    /// retreatment is disabled.
    pub retreatment_probabilities: BTreeMap<u32, f64>,
}

impl TreatmentProtocol {
    pub fn from_config(protocol: &ProtocolConfig, retreatment: &RetreatmentConfig) -> SimResult<Self> {
        if protocol.interval_days == 0 {
            return Err(SimError::InvalidConfig(
                "Protocol interval must be at least one day".to_string()
            ));
        }

        let end_date = protocol.start_date
            .checked_add_signed(Duration::days(protocol.duration_days as i64))
            .ok_or_else(|| SimError::InvalidConfig(
                format!("Protocol duration of {} days overflows the calendar", protocol.duration_days)
            ))?;

        let (monitoring_interval_days, retreatment_probabilities) = if retreatment.enabled {
            (Some(retreatment.monitoring_interval_days), retreatment.probabilities.clone())
        } else {
            (None, BTreeMap::new())
        };

        Ok(Self {
            interval_days: protocol.interval_days,
            start_date: protocol.start_date,
            end_date,
            monitoring_interval_days,
            retreatment_probabilities,
        })
    }

    /// Whether a visit on `date` falls inside the simulated horizon.
    pub fn is_within_horizon(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date < self.end_date
    }

    /// Date of the next visit, or `None` past the end of the calendar.
    pub fn next_visit(&self, date: NaiveDate, interval_days: u32) -> Option<NaiveDate> {
        date.checked_add_signed(Duration::days(interval_days as i64))
    }

    /// Chance of resuming treatment at a monitoring visit on `date` for a
    /// patient discontinued on `discontinued_on`.
    pub fn retreatment_probability(&self, discontinued_on: NaiveDate, date: NaiveDate) -> f64 {
        let year = simulation_year(discontinued_on, date);
        year_table_lookup(&self.retreatment_probabilities, year)
    }
}

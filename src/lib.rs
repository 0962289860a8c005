//! Patient-level simulation of anti-VEGF treatment for neovascular AMD.
//!
//! The clinical improvement models (loading phase, yearly discontinuation
//! hazard, response-based vision, baseline distribution and responder
//! heterogeneity) are composed per patient by [`patient::PatientStateWrapper`]
//! and driven through the visit loop in [`simulation::Simulator`].

pub mod config;
pub mod models;
pub mod dosing;
pub mod patient;
pub mod simulation;
pub mod output;
pub mod error;

pub use crate::config::{ClinicalImprovementsConfig, Config};
pub use crate::error::{SimError, SimResult};
pub use crate::patient::{Patient, PatientStateWrapper};
pub use crate::simulation::Simulator;

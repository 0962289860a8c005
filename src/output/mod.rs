use crate::models::ClinicalModels;
use crate::simulation::{PatientResult, PopulationSummary};
use crate::error::SimResult;
use std::path::Path;
use std::fs::File;
use log::info;

pub fn save_results<P: AsRef<Path>>(
    results: &[PatientResult],
    models: &ClinicalModels,
    output_dir: P,
) -> SimResult<()> {
    let output_path = output_dir.as_ref();

    // Visit-level event stream
    save_visit_data(results, &output_path.join("visits.csv"))?;

    // One row per patient
    save_patient_data(results, &output_path.join("patients.csv"))?;

    let summary = PopulationSummary::from_results(results, models);
    save_json(&summary, &output_path.join("population_summary.json"))?;

    let clinical_summaries: Vec<_> = results.iter().map(|r| &r.summary).collect();
    save_json(&clinical_summaries, &output_path.join("clinical_summaries.json"))?;

    generate_report(&summary, models, output_path)?;

    info!("All results saved to {:?}", output_path);
    Ok(())
}

fn save_visit_data<P: AsRef<Path>>(results: &[PatientResult], path: P) -> SimResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    // Field names are read by the downstream plotting tools
    writer.write_record([
        "patient_id", "date", "day", "phase", "interval_days", "vision", "true_vision",
        "vision_change", "injection_given", "is_discontinuation_visit",
        "discontinuation_reason", "discontinuation_type", "is_retreatment_visit",
    ])?;

    for result in results {
        for visit in &result.visits {
            writer.write_record(&[
                result.patient_id.clone(),
                visit.date.to_string(),
                visit.day.to_string(),
                visit.phase.to_string(),
                visit.interval_days.to_string(),
                visit.vision.to_string(),
                format!("{:.3}", visit.true_vision),
                format!("{:.3}", visit.vision_change),
                visit.injection_given.to_string(),
                visit.is_discontinuation_visit.to_string(),
                visit.discontinuation_reason.clone().unwrap_or_default(),
                visit.discontinuation_type.map(|t| t.to_string()).unwrap_or_default(),
                visit.is_retreatment_visit.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn save_patient_data<P: AsRef<Path>>(results: &[PatientResult], path: P) -> SimResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record([
        "patient_id", "response_type", "response_multiplier", "baseline_vision",
        "final_vision", "vision_change", "injections", "visits",
        "discontinuation_year", "retreated",
    ])?;

    for result in results {
        writer.write_record(&[
            result.patient_id.clone(),
            result.response_type.clone(),
            result.response_multiplier.to_string(),
            result.baseline_vision.to_string(),
            result.final_vision().to_string(),
            result.vision_change_from_baseline().to_string(),
            result.injection_count().to_string(),
            result.visits.len().to_string(),
            result.discontinuation_year().map(|y| y.to_string()).unwrap_or_default(),
            result.was_retreated().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_json<T: serde::Serialize + ?Sized, P: AsRef<Path>>(value: &T, path: P) -> SimResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Markdown report comparing the run against the analytic expectations
pub fn generate_report<P: AsRef<Path>>(
    summary: &PopulationSummary,
    models: &ClinicalModels,
    output_dir: P,
) -> SimResult<()> {
    let report_path = output_dir.as_ref().join("simulation_report.md");
    std::fs::write(report_path, render_report(summary, models))?;
    Ok(())
}

fn render_report(summary: &PopulationSummary, models: &ClinicalModels) -> String {
    let features = models.config.enabled_features();
    let features = if features.is_empty() {
        "none (protocol only)".to_string()
    } else {
        features.join(", ")
    };

    let mut discontinuation_rows = String::new();
    for (year, expected) in &summary.discontinuation.expected_cumulative {
        let observed = summary.discontinuation.observed_cumulative
            .get(year)
            .copied()
            .unwrap_or(0.0);
        discontinuation_rows.push_str(&format!(
            "| {} | {:.1}% | {:.1}% |\n",
            year,
            observed * 100.0,
            expected * 100.0
        ));
    }

    let mut response_rows = String::new();
    for (name, share) in &summary.response_types {
        response_rows.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            name,
            share.count,
            share.fraction * 100.0
        ));
    }

    let trajectory = models.vision.get_expected_trajectory(60);
    let trajectory_line = [3, 12, 24, 36, 60]
        .iter()
        .filter_map(|month| trajectory.get(month).map(|change| format!("month {}: {:+.1}", month, change)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# AMD Treatment Simulation Report

## Simulation Overview
- **Number of patients**: {}
- **Clinical improvements**: {}

## Visual Acuity (ETDRS letters)
- Baseline: {:.1} ± {:.1}
- Final: {:.1} ± {:.1}
- Change from baseline: {:+.1} ± {:.1}
- Expected SD of change at {:.1} months: {:.1}
- Expected mean trajectory: {}

## Treatment Burden
- Injections per patient: {:.1} ± {:.1}
- Visits per patient: {:.1}
- Patients retreated: {}

## Discontinuation
- Discontinued: {} ({:.1}%)

| Year | Observed cumulative | Expected cumulative |
|------|---------------------|---------------------|
{}
## Response Types
| Type | Patients | Share |
|------|----------|-------|
{}
## Files Generated
- `visits.csv`: Visit-level events for all patients
- `patients.csv`: Per-patient outcomes
- `population_summary.json`: Population statistics
- `clinical_summaries.json`: Final clinical state of each patient
"#,
        summary.n_patients,
        features,
        summary.vision.baseline_mean,
        summary.vision.baseline_sd,
        summary.vision.final_mean,
        summary.vision.final_sd,
        summary.vision.change_mean,
        summary.vision.change_sd,
        summary.vision.follow_up_months,
        summary.vision.expected_change_sd,
        trajectory_line,
        summary.treatment.injections_mean,
        summary.treatment.injections_sd,
        summary.treatment.visits_mean,
        summary.treatment.retreated,
        summary.discontinuation.discontinued,
        summary.discontinuation.rate * 100.0,
        discontinuation_rows,
        response_rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::simulation::Simulator;

    #[test]
    fn test_report_lists_enabled_features() {
        let mut config = Config::default();
        config.clinical_improvements.enable_all();
        let mut simulator = Simulator::new(config, Some(3)).unwrap();
        let results = simulator.simulate_population(20).unwrap();

        let summary = PopulationSummary::from_results(&results, simulator.models());
        let report = render_report(&summary, simulator.models());

        assert!(report.contains("**Number of patients**: 20"));
        assert!(report.contains("time_based_discontinuation"));
        assert!(report.contains("| 5 |"));
        assert!(report.contains(&format!(
            "Expected SD of change at {:.1} months: {:.1}",
            summary.vision.follow_up_months,
            summary.vision.expected_change_sd
        )));
        assert!(summary.vision.expected_change_sd > 0.0);
    }

    #[test]
    fn test_save_results_writes_files() {
        let dir = std::env::temp_dir().join(format!("amd_simulation_output_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut simulator = Simulator::new(Config::default(), Some(4)).unwrap();
        let results = simulator.simulate_population(3).unwrap();
        save_results(&results, simulator.models(), &dir).unwrap();

        for file in ["visits.csv", "patients.csv", "population_summary.json",
                     "clinical_summaries.json", "simulation_report.md"] {
            assert!(dir.join(file).exists(), "{} missing", file);
        }

        let visits = std::fs::read_to_string(dir.join("visits.csv")).unwrap();
        assert!(visits.starts_with("patient_id,date,day,phase,interval_days,vision"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use amd_simulation::config::Config;
use amd_simulation::output;
use amd_simulation::simulation::Simulator;

#[derive(Parser)]
#[command(name = "amd_simulation")]
#[command(about = "Patient-level anti-VEGF treatment simulation for AMD")]
struct Cli {
    /// Configuration file path (JSON); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    
    /// Output directory
    #[arg(short, long)]
    output: PathBuf,
    
    /// Number of patients to simulate
    #[arg(short, long)]
    patients: Option<usize>,
    
    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,
    
    /// Enable every clinical improvement
    #[arg(long, conflicts_with = "baseline_only")]
    all_improvements: bool,
    
    /// Disable every clinical improvement
    #[arg(long)]
    baseline_only: bool,
    
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
    
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("failed to load configuration from {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => {
            warn!("No configuration file given, using built-in defaults");
            Config::default()
        }
    };
    
    if cli.all_improvements {
        config.clinical_improvements.enable_all();
    } else if cli.baseline_only {
        config.clinical_improvements.disable_all();
    }
    
    let n_patients = cli.patients.unwrap_or(config.simulation.n_patients);
    if let Some(seed) = cli.seed {
        info!("Starting AMD simulation with {} patients (seed: {})", n_patients, seed);
    } else {
        info!("Starting AMD simulation with {} patients (random seed)", n_patients);
    }
    
    let mut simulator = Simulator::new(config, cli.seed)
        .context("invalid simulation configuration")?;
    
    let results = simulator.simulate_population(n_patients)?;
    info!("Simulation completed for {} patients", results.len());
    
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output directory {:?}", cli.output))?;
    
    output::save_results(&results, simulator.models(), &cli.output)?;
    info!("Results saved to {:?}", cli.output);
    
    Ok(())
}

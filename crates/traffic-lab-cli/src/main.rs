use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use traffic_lab_abstract::{
    EngineOptions, ReportOptions, RunProfile, SamplerConfig, SimulationConfig,
};
use traffic_lab_sampler::{
    MetricsTable, NetworkSummary, SimulationReport, SimulationSampler, export, render_results,
};
use traffic_lab_traci::SumoEngine;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Sample per-edge traffic from a SUMO simulation")]
struct Args {
    /// SUMO configuration file (.sumocfg).
    #[arg(long)]
    config: Option<PathBuf>,

    /// TOML run profile; command-line flags override it.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Launch sumo-gui instead of sumo.
    #[arg(long, default_value_t = false)]
    gui: bool,

    #[arg(long)]
    sumo_home: Option<PathBuf>,

    /// Simulation step length in seconds.
    #[arg(long)]
    step_length: Option<f64>,

    /// Give up after this many steps if vehicles are still pending.
    #[arg(long)]
    max_steps: Option<u64>,

    #[arg(long)]
    progress_interval: Option<u64>,

    /// Directory for the CSV and JSON result files.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    no_csv: bool,
    #[arg(long, default_value_t = false)]
    no_json: bool,
}

#[derive(Debug, Default)]
struct Settings {
    simulation: SimulationConfig,
    engine: EngineOptions,
    sampler: SamplerConfig,
    report: ReportOptions,
}

impl Args {
    fn settings(&self, profile: &RunProfile) -> Settings {
        let mut settings = Settings::default();
        profile.simulation.apply_to(&mut settings.simulation);
        profile.engine.apply_to(&mut settings.engine);
        profile.sampler.apply_to(&mut settings.sampler);
        profile.report.apply_to(&mut settings.report);

        if let Some(path) = &self.config {
            settings.simulation.config_path = path.clone();
        }
        if let Some(step) = self.step_length {
            settings.simulation.step_length = Some(step);
        }
        if self.gui {
            settings.engine.gui = true;
        }
        if let Some(home) = &self.sumo_home {
            settings.engine.sumo_home = Some(home.clone());
        }
        if let Some(limit) = self.max_steps {
            settings.sampler.max_steps = Some(limit);
        }
        if let Some(interval) = self.progress_interval {
            settings.sampler.progress_interval = interval;
        }
        if let Some(dir) = &self.out_dir {
            settings.report.out_dir = dir.clone();
        }
        if self.no_csv {
            settings.report.csv = false;
        }
        if self.no_json {
            settings.report.json = false;
        }
        settings
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("traffic-lab starting…");

    let profile = match &args.profile {
        Some(path) => load_profile(path)?,
        None => RunProfile::default(),
    };
    let settings = args.settings(&profile);

    let mut sampler = SimulationSampler::new(SumoEngine::new(settings.engine), settings.sampler);
    let run = sampler
        .run(&settings.simulation)
        .context("Simulation run failed")?;

    let now = chrono::Local::now();
    let table = MetricsTable::from_samples(&run.edges);
    println!("{}", render_results(&NetworkSummary::new(&table, run.steps)));

    let report = SimulationReport::new(&settings.simulation, &run, &now);
    let files = export(&report, &settings.report, &now)?;
    if files.csv.is_none() && files.json.is_none() {
        info!("Result export disabled");
    }
    Ok(())
}

fn load_profile(path: &Path) -> Result<RunProfile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile {}", path.display()))?;
    let profile: RunProfile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse profile {}", path.display()))?;
    Ok(profile)
}

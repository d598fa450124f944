use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identifies what the engine should load. The sampler never looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Path to the `.sumocfg` file tying network, routes and signal plans together.
    pub config_path: PathBuf,
    /// Forwarded as `--step-length` when set; otherwise the config file decides.
    pub step_length: Option<f64>,
    /// Extra arguments appended verbatim to the engine command line.
    pub extra_args: Vec<String>,
}

impl SimulationConfig {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            step_length: None,
            extra_args: Vec::new(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new("simulation/sumo_config.sumocfg")
    }
}

/// How the external engine binary is located and reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Launch `sumo-gui` instead of the headless `sumo`.
    pub gui: bool,
    /// Installation root; falls back to `SUMO_HOME` and common install paths.
    pub sumo_home: Option<PathBuf>,
    /// Fixed remote-control port. `None` picks a free local port.
    pub port: Option<u16>,
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
}

impl EngineOptions {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            gui: false,
            sumo_home: None,
            port: None,
            connect_retries: 60,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Emit a progress line every this many steps. Zero disables it.
    pub progress_interval: u64,
    /// Abort once this many steps ran with vehicles still pending. `None` never aborts.
    pub max_steps: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            progress_interval: 50,
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub out_dir: PathBuf,
    pub csv: bool,
    pub json: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            csv: true,
            json: true,
        }
    }
}

use crate::config::{EngineOptions, ReportOptions, SamplerConfig, SimulationConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// A run profile read from TOML. Every table and key is optional; present
/// keys override the defaults, absent ones leave them alone.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RunProfile {
    pub simulation: SimulationOverride,
    pub engine: EngineOverride,
    pub sampler: SamplerOverride,
    pub report: ReportOverride,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationOverride {
    pub config: Option<PathBuf>,
    pub step_length: Option<f64>,
    pub extra_args: Option<Vec<String>>,
}

impl SimulationOverride {
    pub fn apply_to(&self, config: &mut SimulationConfig) {
        if let Some(v) = &self.config {
            config.config_path = v.clone();
        }
        if let Some(v) = self.step_length {
            config.step_length = Some(v);
        }
        if let Some(v) = &self.extra_args {
            config.extra_args = v.clone();
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOverride {
    pub gui: Option<bool>,
    pub sumo_home: Option<PathBuf>,
    pub port: Option<u16>,
    pub connect_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl EngineOverride {
    pub fn apply_to(&self, options: &mut EngineOptions) {
        if let Some(v) = self.gui {
            options.gui = v;
        }
        if let Some(v) = &self.sumo_home {
            options.sumo_home = Some(v.clone());
        }
        if let Some(v) = self.port {
            options.port = Some(v);
        }
        if let Some(v) = self.connect_retries {
            options.connect_retries = v;
        }
        if let Some(v) = self.retry_delay_ms {
            options.retry_delay_ms = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerOverride {
    pub progress_interval: Option<u64>,
    pub max_steps: Option<u64>,
}

impl SamplerOverride {
    pub fn apply_to(&self, config: &mut SamplerConfig) {
        if let Some(v) = self.progress_interval {
            config.progress_interval = v;
        }
        if let Some(v) = self.max_steps {
            config.max_steps = Some(v);
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ReportOverride {
    pub out_dir: Option<PathBuf>,
    pub csv: Option<bool>,
    pub json: Option<bool>,
}

impl ReportOverride {
    pub fn apply_to(&self, options: &mut ReportOptions) {
        if let Some(v) = &self.out_dir {
            options.out_dir = v.clone();
        }
        if let Some(v) = self.csv {
            options.csv = v;
        }
        if let Some(v) = self.json {
            options.json = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_profile_only_touches_present_keys() {
        let profile: RunProfile = toml::from_str(
            r#"
            [simulation]
            config = "grid/grid.sumocfg"

            [engine]
            gui = true

            [sampler]
            max_steps = 3600
            "#,
        )
        .unwrap();

        let mut sim = SimulationConfig::default();
        let mut engine = EngineOptions::default();
        let mut sampler = SamplerConfig::default();
        let mut report = ReportOptions::default();
        profile.simulation.apply_to(&mut sim);
        profile.engine.apply_to(&mut engine);
        profile.sampler.apply_to(&mut sampler);
        profile.report.apply_to(&mut report);

        assert_eq!(sim.config_path, PathBuf::from("grid/grid.sumocfg"));
        assert_eq!(sim.step_length, None);
        assert!(engine.gui);
        assert_eq!(engine.connect_retries, 60);
        assert_eq!(sampler.max_steps, Some(3600));
        assert_eq!(sampler.progress_interval, 50);
        assert_eq!(report, ReportOptions::default());
    }

    #[test]
    fn empty_profile_is_valid() {
        let profile: RunProfile = toml::from_str("").unwrap();
        let mut sampler = SamplerConfig::default();
        profile.sampler.apply_to(&mut sampler);
        assert_eq!(sampler, SamplerConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<RunProfile, _> = toml::from_str("[engine]\nbinary = \"sumo\"\n");
        assert!(parsed.is_err());
    }
}

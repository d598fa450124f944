pub mod config;
pub mod interface;
pub mod profile;
pub mod sample;

pub use interface::{EngineError, EngineSession, SimulationEngine};
pub use sample::{EdgeSample, EdgeSamples};

pub use config::{EngineOptions, ReportOptions, SamplerConfig, SimulationConfig};
pub use profile::{EngineOverride, ReportOverride, RunProfile, SamplerOverride, SimulationOverride};

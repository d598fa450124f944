pub mod export;
pub mod metrics;
pub mod report;
pub mod sampler;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use export::{ExportedFiles, export};
pub use metrics::{EdgeMetrics, MetricsTable};
pub use report::{NetworkSummary, SimulationReport, render_results};
pub use sampler::{SampledRun, SamplerError, SimulationSampler};

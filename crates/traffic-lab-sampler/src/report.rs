use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write;
use traffic_lab_abstract::SimulationConfig;

use crate::metrics::{EdgeMetrics, MetricsTable};
use crate::sampler::SampledRun;

/// Edges averaging at most this many vehicles are left out of the summary.
pub const SIGNIFICANT_MIN_AVG_VEHICLES: f64 = 0.1;

const RULE_WIDTH: usize = 80;

/// Junction-internal edges carry a leading `:` in SUMO networks.
pub fn is_internal_edge(edge_id: &str) -> bool {
    edge_id.starts_with(':')
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationInfo {
    pub config_file: String,
    pub total_steps: u64,
    /// RFC 3339, local time.
    pub timestamp: String,
}

/// The persisted record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub simulation_info: SimulationInfo,
    pub edge_metrics: MetricsTable,
}

impl SimulationReport {
    pub fn new(config: &SimulationConfig, run: &SampledRun, generated_at: &DateTime<Local>) -> Self {
        Self {
            simulation_info: SimulationInfo {
                config_file: config.config_path.display().to_string(),
                total_steps: run.steps,
                timestamp: generated_at.to_rfc3339(),
            },
            edge_metrics: MetricsTable::from_samples(&run.edges),
        }
    }
}

/// Headline numbers over the significant edges of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSummary {
    /// Non-internal edges with real traffic, densest first.
    pub significant: Vec<(String, EdgeMetrics)>,
    pub total_steps: u64,
}

impl NetworkSummary {
    pub fn new(table: &MetricsTable, total_steps: u64) -> Self {
        let mut significant: Vec<(String, EdgeMetrics)> = table
            .iter()
            .filter(|(id, m)| !is_internal_edge(id) && m.avg_vehicles > SIGNIFICANT_MIN_AVG_VEHICLES)
            .map(|(id, m)| (id.to_string(), *m))
            .collect();
        // stable sort keeps table order among equal densities
        significant.sort_by(|a, b| b.1.avg_vehicles.total_cmp(&a.1.avg_vehicles));
        Self {
            significant,
            total_steps,
        }
    }

    pub fn densest(&self) -> Option<(&str, &EdgeMetrics)> {
        self.significant.first().map(|(id, m)| (id.as_str(), m))
    }

    /// Mean of `avg_vehicles` over the significant edges.
    pub fn network_average(&self) -> Option<f64> {
        if self.significant.is_empty() {
            return None;
        }
        let total: f64 = self.significant.iter().map(|(_, m)| m.avg_vehicles).sum();
        Some(total / self.significant.len() as f64)
    }
}

/// Console rendering of the results table and summary.
pub fn render_results(summary: &NetworkSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(s.trim_end());
        out.push('\n');
    };

    line(rule.clone());
    line("SIMULATION RESULTS".to_string());
    line(rule.clone());
    line(String::new());
    line(format!(
        "{:<15} {:<15} {:<15} {:<18} {:<18}",
        "Edge ID", "Avg Vehicles", "Max Vehicles", "Avg Speed (m/s)", "Avg Occupancy (%)"
    ));
    line("-".repeat(RULE_WIDTH));
    for (id, m) in &summary.significant {
        line(format!(
            "{:<15} {:<15.2} {:<15} {:<18.2} {:<18.2}",
            id,
            m.avg_vehicles,
            m.max_vehicles,
            m.avg_speed,
            m.avg_occupancy * 100.0
        ));
    }
    line(String::new());
    line(rule);
    line(String::new());

    let mut tail = String::new();
    writeln!(tail, "SUMMARY STATISTICS").ok();
    writeln!(tail, "   Total edges analyzed: {}", summary.significant.len()).ok();
    match (summary.densest(), summary.network_average()) {
        (Some((id, m)), Some(avg)) => {
            writeln!(tail, "   Highest density edge: {id} ({:.2} vehicles)", m.avg_vehicles).ok();
            writeln!(tail, "   Network average: {avg:.2} vehicles").ok();
        }
        _ => {
            writeln!(tail, "   No edge carried significant traffic").ok();
        }
    }
    writeln!(tail, "   Total simulation steps: {}", summary.total_steps).ok();
    out.push_str(&tail);
    out
}

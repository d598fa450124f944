use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use traffic_lab_abstract::{EdgeSample, EdgeSamples};

/// Aggregate statistics for one edge over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeMetrics {
    pub avg_vehicles: f64,
    pub max_vehicles: u32,
    /// m/s
    pub avg_speed: f64,
    /// Fraction in `0.0..=1.0`.
    pub avg_occupancy: f64,
}

impl EdgeMetrics {
    /// `None` for an edge with no observations.
    pub fn from_sample(sample: &EdgeSample) -> Option<Self> {
        if sample.is_empty() {
            return None;
        }
        let counts = sample.vehicle_counts();
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        Some(Self {
            avg_vehicles: total as f64 / counts.len() as f64,
            max_vehicles: counts.iter().copied().max().unwrap_or(0),
            avg_speed: mean(sample.speeds()),
            avg_occupancy: mean(sample.occupancies()),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Per-edge metrics in the order the edges were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    rows: Vec<(String, EdgeMetrics)>,
}

impl MetricsTable {
    pub fn from_samples(samples: &EdgeSamples) -> Self {
        let rows = samples
            .iter()
            .filter_map(|s| EdgeMetrics::from_sample(s).map(|m| (s.edge_id().to_string(), m)))
            .collect();
        Self { rows }
    }

    pub fn get(&self, edge_id: &str) -> Option<&EdgeMetrics> {
        self.rows
            .iter()
            .find(|(id, _)| id == edge_id)
            .map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EdgeMetrics)> {
        self.rows.iter().map(|(id, m)| (id.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Serialized as a map so the JSON report reads `{ "edge": { .. } }` in table order.
impl Serialize for MetricsTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (id, metrics) in &self.rows {
            map.serialize_entry(id, metrics)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_and_maximum() {
        let mut sample = EdgeSample::new("e1");
        sample.push(1, 10.0, 0.1);
        sample.push(4, 6.0, 0.3);
        sample.push(1, 8.0, 0.2);

        let m = EdgeMetrics::from_sample(&sample).unwrap();
        assert_eq!(m.avg_vehicles, 2.0);
        assert_eq!(m.max_vehicles, 4);
        assert_eq!(m.avg_speed, 8.0);
        assert!((m.avg_occupancy - 0.2).abs() < 1e-12);
    }

    #[test]
    fn empty_sample_has_no_metrics() {
        assert_eq!(EdgeMetrics::from_sample(&EdgeSample::new("idle")), None);
    }

    #[test]
    fn table_keeps_sample_order() {
        let mut samples = EdgeSamples::new();
        samples.record("north", 2, 11.0, 0.1);
        samples.record("south", 0, 13.9, 0.0);
        samples.record("north", 4, 9.0, 0.3);

        let table = MetricsTable::from_samples(&samples);
        let ids: Vec<&str> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["north", "south"]);
        assert_eq!(table.get("north").unwrap().avg_vehicles, 3.0);
        assert_eq!(table.get("south").unwrap().max_vehicles, 0);
    }

    #[test]
    fn serializes_as_ordered_map() {
        let mut samples = EdgeSamples::new();
        samples.record("zz", 1, 1.0, 0.0);
        samples.record("aa", 2, 2.0, 0.5);

        let json = serde_json::to_string(&MetricsTable::from_samples(&samples)).unwrap();
        assert_eq!(
            json,
            r#"{"zz":{"avg_vehicles":1.0,"max_vehicles":1,"avg_speed":1.0,"avg_occupancy":0.0},"aa":{"avg_vehicles":2.0,"max_vehicles":2,"avg_speed":2.0,"avg_occupancy":0.5}}"#
        );
    }
}

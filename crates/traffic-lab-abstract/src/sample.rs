use serde::Serialize;
use std::collections::HashMap;

/// Per-step observations of one edge.
///
/// The three sequences only grow through [`EdgeSample::push`], so they
/// always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSample {
    edge_id: String,
    vehicle_counts: Vec<u32>,
    speeds: Vec<f64>,
    occupancies: Vec<f64>,
}

impl EdgeSample {
    pub fn new(edge_id: impl Into<String>) -> Self {
        Self {
            edge_id: edge_id.into(),
            vehicle_counts: Vec::new(),
            speeds: Vec::new(),
            occupancies: Vec::new(),
        }
    }

    pub fn push(&mut self, vehicles: u32, speed: f64, occupancy: f64) {
        self.vehicle_counts.push(vehicles);
        self.speeds.push(speed);
        self.occupancies.push(occupancy);
    }

    pub fn edge_id(&self) -> &str {
        &self.edge_id
    }

    pub fn vehicle_counts(&self) -> &[u32] {
        &self.vehicle_counts
    }

    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    pub fn occupancies(&self) -> &[f64] {
        &self.occupancies
    }

    /// Number of steps during which the edge was reported.
    pub fn len(&self) -> usize {
        self.vehicle_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicle_counts.is_empty()
    }
}

/// Edge samples keyed by edge id, kept in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EdgeSamples {
    edges: Vec<EdgeSample>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EdgeSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step's observations for `edge_id`, creating the entry on first sight.
    pub fn record(&mut self, edge_id: &str, vehicles: u32, speed: f64, occupancy: f64) {
        let slot = match self.index.get(edge_id) {
            Some(&slot) => slot,
            None => {
                self.edges.push(EdgeSample::new(edge_id));
                let slot = self.edges.len() - 1;
                self.index.insert(edge_id.to_string(), slot);
                slot
            }
        };
        self.edges[slot].push(vehicles, speed, occupancy);
    }

    pub fn get(&self, edge_id: &str) -> Option<&EdgeSample> {
        self.index.get(edge_id).map(|&slot| &self.edges[slot])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EdgeSample> {
        self.edges.iter()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(|e| e.edge_id())
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl<'a> IntoIterator for &'a EdgeSamples {
    type Item = &'a EdgeSample;
    type IntoIter = std::slice::Iter<'a, EdgeSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_appearance_order() {
        let mut samples = EdgeSamples::new();
        samples.record("zeta", 1, 5.0, 0.1);
        samples.record("alpha", 0, 0.0, 0.0);
        samples.record("zeta", 2, 4.0, 0.2);

        let ids: Vec<&str> = samples.edge_ids().collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(samples.get("zeta").unwrap().vehicle_counts(), &[1, 2]);
        assert_eq!(samples.get("alpha").unwrap().len(), 1);
        assert!(samples.get("missing").is_none());
    }

    #[test]
    fn sequences_grow_together() {
        let mut sample = EdgeSample::new("e1");
        sample.push(3, 12.5, 0.3);
        sample.push(4, 11.0, 0.4);
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.speeds().len(), sample.vehicle_counts().len());
        assert_eq!(sample.occupancies().len(), sample.vehicle_counts().len());
    }
}

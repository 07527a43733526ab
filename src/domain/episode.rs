use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NodeId;

/// Route chosen for one substation in one episode.
///
/// `path` is `None` when the substation could not be connected to its
/// sampled generator this cycle; such substations are surfaced rather
/// than silently dropped, and excluded from the episode aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRecord {
    pub substation_id: NodeId,
    pub substation_name: String,
    pub generator_id: NodeId,
    pub generator_name: String,
    pub demand_mw: f64,
    /// Node sequence from substation to generator, consecutive pairs
    /// connected by lines in the topology.
    pub path: Option<Vec<NodeId>>,
    /// I²R transmission loss in MW (demand × path resistance).
    pub loss_mw: Option<f64>,
}

impl PathRecord {
    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }
}

/// Published snapshot of one completed optimization episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeResult {
    /// Monotonic episode counter; results are totally ordered by it.
    pub episode: u64,
    pub paths: Vec<PathRecord>,
    pub total_demand_mw: f64,
    pub total_loss_mw: f64,
    /// 100 × Σ loss / Σ demand over resolved substations.
    pub loss_percent: f64,
    /// Average risk over the lines used by the resolved paths.
    pub avg_risk: f64,
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
}

/// One bounded-history sample of episode quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub loss_percent: f64,
    pub avg_risk: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_record_has_no_loss() {
        let rec = PathRecord {
            substation_id: 4,
            substation_name: "Industrial Zone Station".into(),
            generator_id: 0,
            generator_name: "North Power Plant".into(),
            demand_mw: 75.0,
            path: None,
            loss_mw: None,
        };
        assert!(!rec.is_resolved());
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json["path"].is_null());
        assert!(json["loss_mw"].is_null());
    }
}

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Undirected transmission line between two buses.
///
/// Endpoints are stored with `a < b` so a line has exactly one canonical key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub a: NodeId,
    pub b: NodeId,
    /// Ohmic resistance in Ω. Never negative.
    pub resistance_ohm: f64,
    pub current_a: f64,
    pub temperature_c: f64,
    /// Approximate power flow in MW (avg voltage × current / 1000).
    pub power_flow_mw: f64,
    /// Predicted failure probability from the risk oracle, clamped to [0, 1].
    pub risk: f64,
}

impl Line {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            a,
            b,
            resistance_ohm: 0.002,
            current_a: 0.0,
            temperature_c: 25.0,
            power_flow_mw: 0.0,
            risk: 0.0,
        }
    }

    /// Canonical key for lookups regardless of endpoint order.
    pub fn key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn connects(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint at all.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.a == node {
            Some(self.b)
        } else if self.b == node {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Mutable telemetry fields of a line, as delivered by the SCADA source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReading {
    pub a: NodeId,
    pub b: NodeId,
    pub resistance_ohm: f64,
    pub current_a: f64,
    pub temperature_c: f64,
    pub power_flow_mw: f64,
}

/// Mutable telemetry fields of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReading {
    pub id: NodeId,
    pub voltage_kv: f64,
    /// Present for substations only (base demand ± noise).
    pub demand_mw: Option<f64>,
}

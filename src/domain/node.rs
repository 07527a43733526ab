use serde::{Deserialize, Serialize};

/// Stable 0-indexed node identifier. Generators come first, substations after.
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Generator,
    Substation,
}

/// A bus in the transmission grid: either a generator (supply, zero demand)
/// or a substation (constant demand that must be routed to some generator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Constant demand in MW. Always 0.0 for generators; the base value
    /// never changes for substations, only telemetry noise applies on top.
    pub base_demand_mw: f64,
    /// Demand as last reported by telemetry (base ± noise).
    pub demand_mw: f64,
    /// Noisy telemetry voltage in kV, centered near the 220 kV nominal.
    pub voltage_kv: f64,
}

impl Node {
    pub fn generator(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Generator,
            base_demand_mw: 0.0,
            demand_mw: 0.0,
            voltage_kv: 220.0,
        }
    }

    pub fn substation(id: NodeId, name: impl Into<String>, demand_mw: f64) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Substation,
            base_demand_mw: demand_mw,
            demand_mw,
            voltage_kv: 220.0,
        }
    }

    pub fn is_generator(&self) -> bool {
        self.kind == NodeKind::Generator
    }

    pub fn is_substation(&self) -> bool {
        self.kind == NodeKind::Substation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_has_zero_demand() {
        let g = Node::generator(0, "North Power Plant");
        assert!(g.is_generator());
        assert_eq!(g.base_demand_mw, 0.0);
        assert_eq!(g.demand_mw, 0.0);
    }

    #[test]
    fn substation_keeps_base_demand() {
        let s = Node::substation(2, "Downtown Substation", 45.0);
        assert!(s.is_substation());
        assert_eq!(s.base_demand_mw, 45.0);
    }
}

//! # Topology Store
//!
//! In-memory snapshot of the transmission grid: nodes, lines and their
//! mutable telemetry fields. The set of nodes and lines is fixed at
//! construction; telemetry updates may only replace field values on
//! entities that already exist.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{Line, LineReading, Node, NodeId, NodeReading};
use crate::error::GridError;

/// Named seed nodes of the default 8-bus system.
const SEED_GENERATORS: [&str; 2] = ["North Power Plant", "South Thermal Station"];
const SEED_SUBSTATIONS: [(&str, f64); 6] = [
    ("Downtown Substation", 45.0),
    ("Uptown Substation", 52.0),
    ("Industrial Zone Station", 75.0),
    ("Residential Hub", 38.0),
    ("Shopping Complex Node", 41.0),
    ("University Campus Hub", 48.0),
];

/// Edge probability for the Erdős–Rényi random construction.
const EDGE_PROBABILITY: f64 = 0.5;
const MAX_CONSTRUCTION_ATTEMPTS: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    nodes: Vec<Node>,
    lines: Vec<Line>,
    /// node id → indices into `lines` for incident lines.
    adjacency: HashMap<NodeId, Vec<usize>>,
    /// canonical (a, b) endpoint pair → index into `lines`.
    line_index: HashMap<(NodeId, NodeId), usize>,
}

/// Outcome of a bulk telemetry apply. Rejected updates carry the
/// `UnknownEntity` errors for updates referencing ids outside the
/// initialized topology; those updates are dropped, the rest applied.
#[derive(Debug, Default)]
pub struct TelemetryOutcome {
    pub applied: usize,
    pub rejected: Vec<GridError>,
}

impl Topology {
    /// Build a random connected topology with `num_generators` generators
    /// followed by `num_nodes - num_generators` substations. Fails with
    /// `InvalidTopology` if the parameters are degenerate or a connected
    /// graph cannot be produced; this is the only fatal startup error.
    pub fn connected_random<R: Rng + ?Sized>(
        num_nodes: usize,
        num_generators: usize,
        rng: &mut R,
    ) -> Result<Self, GridError> {
        if num_nodes < 2 {
            return Err(GridError::InvalidTopology(format!(
                "need at least 2 nodes, got {num_nodes}"
            )));
        }
        if num_generators == 0 || num_generators >= num_nodes {
            return Err(GridError::InvalidTopology(format!(
                "need 1..{num_nodes} generators, got {num_generators}"
            )));
        }

        let nodes = Self::seed_nodes(num_nodes, num_generators, rng);

        for _ in 0..MAX_CONSTRUCTION_ATTEMPTS {
            let mut lines = Vec::new();
            for a in 0..num_nodes {
                for b in (a + 1)..num_nodes {
                    if rng.gen_bool(EDGE_PROBABILITY) {
                        lines.push(Line::new(a, b));
                    }
                }
            }
            let topology = Self::from_parts(nodes.clone(), lines)?;
            if topology.ensure_connected().is_ok() {
                return Ok(topology);
            }
        }

        Err(GridError::InvalidTopology(
            "failed to generate a connected grid".into(),
        ))
    }

    /// Build from explicit parts, validating the node-id partition,
    /// line endpoints and non-negative resistances. Connectivity is a
    /// startup requirement checked separately via `ensure_connected`;
    /// a graph that loses a substation's route at runtime degrades per
    /// substation instead.
    pub fn from_parts(nodes: Vec<Node>, lines: Vec<Line>) -> Result<Self, GridError> {
        for (expected, node) in nodes.iter().enumerate() {
            if node.id != expected {
                return Err(GridError::InvalidTopology(format!(
                    "node ids must be dense and 0-indexed, found {} at position {expected}",
                    node.id
                )));
            }
        }

        let mut adjacency: HashMap<NodeId, Vec<usize>> =
            (0..nodes.len()).map(|id| (id, Vec::new())).collect();
        let mut line_index = HashMap::new();

        for (idx, line) in lines.iter().enumerate() {
            if line.a >= nodes.len() || line.b >= nodes.len() || line.a == line.b {
                return Err(GridError::InvalidTopology(format!(
                    "line {}-{} has endpoints outside the node set",
                    line.a, line.b
                )));
            }
            if line.resistance_ohm < 0.0 {
                return Err(GridError::InvalidTopology(format!(
                    "line {}-{} has negative resistance",
                    line.a, line.b
                )));
            }
            if line_index.insert(Line::key(line.a, line.b), idx).is_some() {
                return Err(GridError::InvalidTopology(format!(
                    "duplicate line {}-{}",
                    line.a, line.b
                )));
            }
            adjacency.get_mut(&line.a).unwrap().push(idx);
            adjacency.get_mut(&line.b).unwrap().push(idx);
        }

        Ok(Self {
            nodes,
            lines,
            adjacency,
            line_index,
        })
    }

    /// Startup invariant: every node reachable from node 0.
    pub fn ensure_connected(&self) -> Result<(), GridError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GridError::InvalidTopology("grid is not connected".into()))
        }
    }

    fn seed_nodes<R: Rng + ?Sized>(
        num_nodes: usize,
        num_generators: usize,
        rng: &mut R,
    ) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(num_nodes);
        for id in 0..num_generators {
            let name = SEED_GENERATORS
                .get(id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Generator {id}"));
            nodes.push(Node::generator(id, name));
        }
        for id in num_generators..num_nodes {
            let seed = SEED_SUBSTATIONS.get(id - num_generators);
            let (name, demand) = match seed {
                Some((name, demand)) => (name.to_string(), *demand),
                None => (format!("Substation {id}"), rng.gen_range(20.0..60.0)),
            };
            nodes.push(Node::substation(id, name, demand));
        }
        nodes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn generators(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_generator())
    }

    pub fn substations(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_substation())
    }

    pub fn line_between(&self, a: NodeId, b: NodeId) -> Option<&Line> {
        self.line_index
            .get(&Line::key(a, b))
            .map(|&idx| &self.lines[idx])
    }

    /// Lines incident to `node_id`, in construction order.
    pub fn neighbors(&self, node_id: NodeId) -> impl Iterator<Item = &Line> {
        self.adjacency
            .get(&node_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.lines[idx])
    }

    pub fn degree(&self, node_id: NodeId) -> usize {
        self.adjacency.get(&node_id).map_or(0, |v| v.len())
    }

    pub fn total_demand_mw(&self) -> f64 {
        self.substations().map(|n| n.demand_mw).sum()
    }

    pub fn average_risk(&self) -> f64 {
        if self.lines.is_empty() {
            return 0.0;
        }
        self.lines.iter().map(|l| l.risk).sum::<f64>() / self.lines.len() as f64
    }

    /// Replace mutable telemetry fields on existing nodes and lines.
    /// Updates referencing unknown ids are rejected individually; the
    /// topology itself never grows or shrinks.
    pub fn apply_telemetry(
        &mut self,
        node_updates: &[NodeReading],
        line_updates: &[LineReading],
    ) -> TelemetryOutcome {
        let mut outcome = TelemetryOutcome::default();

        for reading in node_updates {
            let Some(node) = self.nodes.get_mut(reading.id) else {
                outcome.rejected.push(GridError::unknown_node(reading.id));
                continue;
            };
            node.voltage_kv = reading.voltage_kv;
            if node.is_substation() {
                if let Some(demand) = reading.demand_mw {
                    node.demand_mw = demand;
                }
            }
            outcome.applied += 1;
        }

        for reading in line_updates {
            let Some(&idx) = self.line_index.get(&Line::key(reading.a, reading.b)) else {
                outcome
                    .rejected
                    .push(GridError::unknown_line(reading.a, reading.b));
                continue;
            };
            let line = &mut self.lines[idx];
            line.resistance_ohm = reading.resistance_ohm.max(0.0);
            line.current_a = reading.current_a;
            line.temperature_c = reading.temperature_c;
            line.power_flow_mw = reading.power_flow_mw;
            outcome.applied += 1;
        }

        outcome
    }

    /// Store an oracle-provided risk score for a line, clamped to [0, 1].
    pub fn set_line_risk(&mut self, a: NodeId, b: NodeId, risk: f64) -> Result<(), GridError> {
        let &idx = self
            .line_index
            .get(&Line::key(a, b))
            .ok_or_else(|| GridError::unknown_line(a, b))?;
        self.lines[idx].risk = risk.clamp(0.0, 1.0);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut queue = VecDeque::from([0usize]);
        seen.insert(0);
        while let Some(node) = queue.pop_front() {
            for line in self.neighbors(node) {
                let next = line.other_end(node).unwrap_or(node);
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.len() == self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn line(a: NodeId, b: NodeId, resistance: f64) -> Line {
        Line {
            resistance_ohm: resistance,
            ..Line::new(a, b)
        }
    }

    fn small_topology() -> Topology {
        let nodes = vec![
            Node::generator(0, "North Power Plant"),
            Node::substation(1, "Downtown Substation", 45.0),
            Node::substation(2, "Uptown Substation", 52.0),
        ];
        let lines = vec![line(0, 1, 0.002), line(1, 2, 0.003)];
        Topology::from_parts(nodes, lines).unwrap()
    }

    #[test]
    fn connected_random_is_connected_and_partitioned() {
        let mut rng = StdRng::seed_from_u64(7);
        let topology = Topology::connected_random(8, 2, &mut rng).unwrap();
        assert_eq!(topology.nodes().len(), 8);
        assert_eq!(topology.generators().count(), 2);
        assert_eq!(topology.substations().count(), 6);
        assert_eq!(topology.node(0).unwrap().name, "North Power Plant");
        assert_eq!(topology.node(2).unwrap().name, "Downtown Substation");
    }

    #[test]
    fn rejects_degenerate_parameters() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(Topology::connected_random(1, 1, &mut rng).is_err());
        assert!(Topology::connected_random(8, 0, &mut rng).is_err());
        assert!(Topology::connected_random(8, 8, &mut rng).is_err());
    }

    #[test]
    fn detects_disconnected_graph() {
        let nodes = vec![
            Node::generator(0, "G"),
            Node::substation(1, "A", 10.0),
            Node::substation(2, "B", 10.0),
        ];
        let lines = vec![line(0, 1, 0.002)];
        let topology = Topology::from_parts(nodes, lines).unwrap();
        let err = topology.ensure_connected().unwrap_err();
        assert!(matches!(err, GridError::InvalidTopology(_)));
    }

    #[test]
    fn rejects_negative_resistance() {
        let nodes = vec![Node::generator(0, "G"), Node::substation(1, "A", 10.0)];
        let lines = vec![line(0, 1, -0.1)];
        assert!(Topology::from_parts(nodes, lines).is_err());
    }

    #[test]
    fn telemetry_updates_existing_entities_only() {
        let mut topology = small_topology();
        let outcome = topology.apply_telemetry(
            &[
                NodeReading {
                    id: 1,
                    voltage_kv: 214.5,
                    demand_mw: Some(46.2),
                },
                NodeReading {
                    id: 99,
                    voltage_kv: 220.0,
                    demand_mw: None,
                },
            ],
            &[
                LineReading {
                    a: 1,
                    b: 0,
                    resistance_ohm: 0.004,
                    current_a: 250.0,
                    temperature_c: 42.0,
                    power_flow_mw: 55.0,
                },
                LineReading {
                    a: 0,
                    b: 2,
                    resistance_ohm: 0.004,
                    current_a: 0.0,
                    temperature_c: 0.0,
                    power_flow_mw: 0.0,
                },
            ],
        );
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(topology.node(1).unwrap().demand_mw, 46.2);
        // Endpoint order does not matter for line updates.
        assert_eq!(topology.line_between(0, 1).unwrap().resistance_ohm, 0.004);
        // Nodes were neither added nor removed.
        assert_eq!(topology.nodes().len(), 3);
    }

    #[test]
    fn telemetry_clamps_negative_resistance() {
        let mut topology = small_topology();
        topology.apply_telemetry(
            &[],
            &[LineReading {
                a: 0,
                b: 1,
                resistance_ohm: -0.5,
                current_a: 0.0,
                temperature_c: 0.0,
                power_flow_mw: 0.0,
            }],
        );
        assert_eq!(topology.line_between(0, 1).unwrap().resistance_ohm, 0.0);
    }

    #[test]
    fn risk_is_clamped_to_unit_interval() {
        let mut topology = small_topology();
        topology.set_line_risk(0, 1, 1.7).unwrap();
        assert_eq!(topology.line_between(0, 1).unwrap().risk, 1.0);
        topology.set_line_risk(0, 1, -0.3).unwrap();
        assert_eq!(topology.line_between(0, 1).unwrap().risk, 0.0);
        assert!(topology.set_line_risk(0, 2, 0.5).is_err());
    }

    #[test]
    fn neighbors_and_degree() {
        let topology = small_topology();
        assert_eq!(topology.degree(1), 2);
        let ends: Vec<_> = topology
            .neighbors(1)
            .map(|l| l.other_end(1).unwrap())
            .collect();
        assert_eq!(ends, vec![0, 2]);
    }
}

//! # Path Finder
//!
//! Dijkstra over the combined resistance + weighted-risk line weights.
//! Ties on total cost are broken by hop count, then by lexicographically
//! smallest node-id sequence, so a fixed topology always yields the same
//! route.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use ordered_float::OrderedFloat;

use crate::domain::NodeId;
use crate::error::GridError;
use crate::grid::{line_weight, Topology};

/// A resolved minimum-cost route from a substation to a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPath {
    /// Node sequence, source first, target last.
    pub nodes: Vec<NodeId>,
    /// Total search cost (resistance + weighted risk).
    pub cost: f64,
    /// Sum of line resistances along the route, in Ω.
    pub total_resistance_ohm: f64,
    /// Sum of line risk scores along the route.
    pub total_risk: f64,
}

impl RoutedPath {
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Transmission loss for a given demand: `demand × Σ resistance`.
    /// Risk steers routing but is not part of the physical loss.
    pub fn loss_mw(&self, demand_mw: f64) -> f64 {
        demand_mw * self.total_resistance_ohm
    }

    /// Average risk per line of the route; 0 for a zero-hop route.
    pub fn avg_risk(&self) -> f64 {
        if self.hops() == 0 {
            0.0
        } else {
            self.total_risk / self.hops() as f64
        }
    }
}

/// Heap entry ordered by (cost, hops, node sequence). `BinaryHeap` is a
/// max-heap, so entries are wrapped in `Reverse` at the call sites.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    cost: OrderedFloat<f64>,
    hops: usize,
    path: Vec<NodeId>,
}

/// Minimum-cost path between `source` and `target` under the current
/// risk weighting. Fails with `NoPath` if the nodes are not connected
/// and `UnknownEntity` if either id is outside the topology.
pub fn shortest_path(
    topology: &Topology,
    source: NodeId,
    target: NodeId,
    risk_weight: f64,
) -> Result<RoutedPath, GridError> {
    if topology.node(source).is_none() {
        return Err(GridError::unknown_node(source));
    }
    if topology.node(target).is_none() {
        return Err(GridError::unknown_node(target));
    }

    let mut heap = BinaryHeap::new();
    let mut settled: HashSet<NodeId> = HashSet::new();
    heap.push(Reverse(Candidate {
        cost: OrderedFloat(0.0),
        hops: 0,
        path: vec![source],
    }));

    while let Some(Reverse(candidate)) = heap.pop() {
        let node = *candidate.path.last().expect("candidate path is non-empty");
        if !settled.insert(node) {
            continue;
        }
        if node == target {
            return Ok(finish(topology, candidate));
        }
        for line in topology.neighbors(node) {
            let next = match line.other_end(node) {
                Some(next) if !settled.contains(&next) => next,
                _ => continue,
            };
            let mut path = candidate.path.clone();
            path.push(next);
            heap.push(Reverse(Candidate {
                cost: candidate.cost + line_weight(line, risk_weight),
                hops: candidate.hops + 1,
                path,
            }));
        }
    }

    Err(GridError::NoPath {
        from: source,
        to: target,
    })
}

fn finish(topology: &Topology, candidate: Candidate) -> RoutedPath {
    let mut total_resistance_ohm = 0.0;
    let mut total_risk = 0.0;
    for pair in candidate.path.windows(2) {
        // Path construction only follows existing lines.
        let line = topology
            .line_between(pair[0], pair[1])
            .expect("path follows topology lines");
        total_resistance_ohm += line.resistance_ohm;
        total_risk += line.risk.clamp(0.0, 1.0);
    }
    RoutedPath {
        nodes: candidate.path,
        cost: candidate.cost.into_inner(),
        total_resistance_ohm,
        total_risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Line, Node};
    use crate::grid::DEFAULT_RISK_WEIGHT;
    use rstest::rstest;

    fn line(a: NodeId, b: NodeId, resistance: f64, risk: f64) -> Line {
        Line {
            resistance_ohm: resistance,
            risk,
            ..Line::new(a, b)
        }
    }

    /// 0 (gen) - 1 - 2, plus a direct 0-2 line.
    fn triangle(direct_resistance: f64, direct_risk: f64) -> Topology {
        let nodes = vec![
            Node::generator(0, "North Power Plant"),
            Node::substation(1, "Downtown Substation", 45.0),
            Node::substation(2, "Uptown Substation", 52.0),
        ];
        let lines = vec![
            line(0, 1, 0.002, 0.0),
            line(1, 2, 0.002, 0.0),
            line(0, 2, direct_resistance, direct_risk),
        ];
        Topology::from_parts(nodes, lines).unwrap()
    }

    #[test]
    fn prefers_lower_combined_cost_despite_higher_resistance() {
        // Direct line: resistance 0.002 but risk 0.9 → cost 9.002.
        // Detour 2-1-0: resistance 0.004, risk 0.1 on one line → cost 1.004.
        let mut topology = triangle(0.002, 0.9);
        topology.set_line_risk(1, 2, 0.1).unwrap();
        let routed = shortest_path(&topology, 2, 0, DEFAULT_RISK_WEIGHT).unwrap();
        assert_eq!(routed.nodes, vec![2, 1, 0]);
        assert!(routed.total_resistance_ohm > 0.002);
    }

    #[test]
    fn prefers_fewer_hops_on_equal_cost() {
        // Exactly representable resistances so both routes cost 0.5:
        // direct in one hop, detour 2-1-0 in two hops of 0.25.
        let nodes = vec![
            Node::generator(0, "G"),
            Node::substation(1, "A", 10.0),
            Node::substation(2, "B", 10.0),
        ];
        let lines = vec![
            line(0, 1, 0.25, 0.0),
            line(1, 2, 0.25, 0.0),
            line(0, 2, 0.5, 0.0),
        ];
        let topology = Topology::from_parts(nodes, lines).unwrap();
        let routed = shortest_path(&topology, 2, 0, DEFAULT_RISK_WEIGHT).unwrap();
        assert_eq!(routed.nodes, vec![2, 0]);
        assert_eq!(routed.hops(), 1);
    }

    #[test]
    fn breaks_remaining_ties_lexicographically() {
        // Diamond 0-1-3 and 0-2-3 with identical weights everywhere.
        let nodes = vec![
            Node::generator(0, "G"),
            Node::substation(1, "A", 10.0),
            Node::substation(2, "B", 10.0),
            Node::substation(3, "C", 10.0),
        ];
        let lines = vec![
            line(0, 1, 0.002, 0.0),
            line(0, 2, 0.002, 0.0),
            line(1, 3, 0.002, 0.0),
            line(2, 3, 0.002, 0.0),
        ];
        let topology = Topology::from_parts(nodes, lines).unwrap();
        let routed = shortest_path(&topology, 3, 0, DEFAULT_RISK_WEIGHT).unwrap();
        assert_eq!(routed.nodes, vec![3, 1, 0]);
    }

    #[test]
    fn consecutive_path_nodes_are_connected() {
        let topology = triangle(0.01, 0.4);
        let routed = shortest_path(&topology, 2, 0, DEFAULT_RISK_WEIGHT).unwrap();
        for pair in routed.nodes.windows(2) {
            assert!(topology.line_between(pair[0], pair[1]).is_some());
        }
    }

    #[test]
    fn loss_uses_resistance_only() {
        let mut topology = triangle(0.001, 0.0);
        topology.set_line_risk(0, 2, 0.0).unwrap();
        let routed = shortest_path(&topology, 2, 0, DEFAULT_RISK_WEIGHT).unwrap();
        assert_eq!(routed.nodes, vec![2, 0]);
        assert!((routed.loss_mw(45.0) - 0.045).abs() < 1e-12);
    }

    #[test]
    fn source_equals_target_is_a_zero_hop_route() {
        let topology = triangle(0.002, 0.0);
        let routed = shortest_path(&topology, 0, 0, DEFAULT_RISK_WEIGHT).unwrap();
        assert_eq!(routed.nodes, vec![0]);
        assert_eq!(routed.cost, 0.0);
        assert_eq!(routed.avg_risk(), 0.0);
    }

    #[test]
    fn disconnected_nodes_yield_no_path() {
        let nodes = vec![
            Node::generator(0, "G"),
            Node::substation(1, "A", 10.0),
            Node::substation(2, "B", 10.0),
        ];
        let lines = vec![line(0, 1, 0.002, 0.0)];
        let topology = Topology::from_parts(nodes, lines).unwrap();
        let err = shortest_path(&topology, 2, 0, DEFAULT_RISK_WEIGHT).unwrap_err();
        assert_eq!(err.to_string(), "no path between node 2 and node 0");
        // A missing route is a leaf error, not a wrapper around one.
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn unknown_node_is_reported() {
        let topology = triangle(0.002, 0.0);
        assert!(matches!(
            shortest_path(&topology, 9, 0, DEFAULT_RISK_WEIGHT),
            Err(GridError::UnknownEntity(_))
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(5.0)]
    #[case(50.0)]
    fn search_is_deterministic(#[case] risk_weight: f64) {
        let mut topology = triangle(0.003, 0.6);
        topology.set_line_risk(0, 1, 0.2).unwrap();
        let first = shortest_path(&topology, 2, 0, risk_weight).unwrap();
        let second = shortest_path(&topology, 2, 0, risk_weight).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn raising_risk_weight_never_raises_chosen_risk() {
        // Monotonic risk aversion on the triangle: track the average risk
        // of the chosen route as the weight grows.
        let mut topology = triangle(0.002, 0.8);
        topology.set_line_risk(0, 1, 0.1).unwrap();
        topology.set_line_risk(1, 2, 0.1).unwrap();
        let mut last_risk = f64::INFINITY;
        for risk_weight in [0.0, 0.01, 0.1, 1.0, 10.0, 100.0] {
            let routed = shortest_path(&topology, 2, 0, risk_weight).unwrap();
            assert!(routed.avg_risk() <= last_risk + 1e-12);
            last_risk = routed.avg_risk();
        }
    }
}

use thiserror::Error;

use crate::domain::NodeId;

/// Domain errors produced by the grid engine.
///
/// Only `InvalidTopology` is fatal, and only during startup. Everything
/// else degrades to "skip this unit of work, continue the episode".
#[derive(Debug, Error)]
pub enum GridError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("no path between node {from} and node {to}")]
    NoPath { from: NodeId, to: NodeId },

    #[error("risk oracle unavailable: {0}")]
    RiskOracleUnavailable(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

impl GridError {
    pub fn unknown_node(id: NodeId) -> Self {
        Self::UnknownEntity(format!("node {id}"))
    }

    pub fn unknown_line(a: NodeId, b: NodeId) -> Self {
        Self::UnknownEntity(format!("line {a}-{b}"))
    }
}

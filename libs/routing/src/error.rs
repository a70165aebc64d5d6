//! Error types for topology construction and graph lifecycle.

use std::time::Duration;

use thiserror::Error;

use crate::name::NodeName;

/// Errors returned by [`Graph`](crate::Graph) operations.
///
/// A failed call never leaves a partial mutation behind; the graph stays
/// usable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A node with this name is already registered.
    #[error("node {0} already exists")]
    DuplicateNode(NodeName),

    /// Both endpoints of the edge are the same node.
    #[error("node {0} cannot connect to itself")]
    SelfEdge(NodeName),

    /// The named node was never added.
    #[error("node {0} not available in the graph")]
    UnknownNode(NodeName),

    /// An edge between the pair already exists (in either direction).
    #[error("edge between {from} and {to} already exists")]
    DuplicateEdge { from: NodeName, to: NodeName },

    /// Edge cost is negative, NaN or infinite.
    #[error("invalid edge cost {cost}: must be finite and non-negative")]
    InvalidCost { cost: f64 },

    /// The topology was frozen by the first broadcast.
    #[error("topology is sealed; nodes and edges cannot change after broadcast")]
    TopologySealed,

    /// The node's actor is no longer running.
    #[error("node {0} has stopped")]
    NodeStopped(NodeName),

    /// Protocol did not go quiet within the allotted time.
    #[error("timeout after {elapsed:?} waiting for convergence ({in_flight} messages in flight)")]
    Timeout { elapsed: Duration, in_flight: usize },
}

impl GraphError {
    /// Returns true if this error was caused by invalid topology input.
    pub fn is_topology_error(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateNode(_)
                | GraphError::SelfEdge(_)
                | GraphError::UnknownNode(_)
                | GraphError::DuplicateEdge { .. }
                | GraphError::InvalidCost { .. }
        )
    }
}

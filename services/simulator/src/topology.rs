//! The demo topology the simulator runs.
//!
//! ```text
//!     A --1-- C --4-- B
//!             |\      |
//!             3 1     1
//!             |  \    |
//!             D --1-- E
//! ```

use dvsim_routing::{Graph, GraphError};
use tracing::error;

pub const NODES: [&str; 5] = ["A", "B", "C", "D", "E"];

pub const EDGES: [(&str, &str, f64); 6] = [
    ("A", "C", 1.0),
    ("B", "C", 4.0),
    ("C", "E", 1.0),
    ("B", "E", 1.0),
    ("C", "D", 3.0),
    ("D", "E", 1.0),
];

/// Add the demo nodes and edges.
///
/// A rejected node or edge is logged and skipped; the returned errors let
/// the caller decide whether that matters.
pub async fn build(graph: &mut Graph) -> Vec<GraphError> {
    let mut errors = Vec::new();

    for name in NODES {
        if let Err(e) = graph.add_node(name) {
            error!(node = name, error = %e, "Failed to add node");
            errors.push(e);
        }
    }

    for (from, to, cost) in EDGES {
        if let Err(e) = graph.add_edge(from, to, cost).await {
            error!(from, to, error = %e, "Failed to add edge");
            errors.push(e);
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_topology_builds_cleanly() {
        let mut graph = Graph::new();
        assert!(build(&mut graph).await.is_empty());
        assert_eq!(graph.len(), NODES.len());
        assert_eq!(graph.edges().count(), EDGES.len());
        graph.shutdown().await;
    }

    #[tokio::test]
    async fn test_rebuilding_reports_duplicates_without_panicking() {
        let mut graph = Graph::new();
        build(&mut graph).await;

        let errors = build(&mut graph).await;
        assert_eq!(errors.len(), NODES.len() + EDGES.len());
        assert!(errors.iter().all(GraphError::is_topology_error));
        graph.shutdown().await;
    }
}

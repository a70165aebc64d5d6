//! Centralized shortest-path computation.
//!
//! Classical Bellman-Ford run once per source over the full, undirected
//! edge list. The distributed protocol must converge to this table, so the
//! output uses the same conventions as a node's vector: no entry for the
//! node itself and no entry for unreachable destinations.
//!
//! Nodes add path costs up in a different order than this computation, so
//! fractional costs can differ in the last bits. Compare tables with
//! [`tables_match`] rather than `==`.

use std::collections::BTreeMap;

use crate::name::NodeName;
use crate::vector::DistanceVector;

/// Relative tolerance used by [`tables_match`].
pub const COST_TOLERANCE: f64 = 1e-9;

/// Returns true if both tables list the same destinations for the same
/// nodes with costs equal up to [`COST_TOLERANCE`].
pub fn tables_match(
    actual: &BTreeMap<NodeName, DistanceVector>,
    expected: &BTreeMap<NodeName, DistanceVector>,
) -> bool {
    actual.len() == expected.len()
        && actual.iter().zip(expected).all(|((a_node, a_vec), (e_node, e_vec))| {
            a_node == e_node
                && a_vec.len() == e_vec.len()
                && a_vec.iter().zip(e_vec.iter()).all(|((a_dest, a), (e_dest, e))| {
                    a_dest == e_dest && (a - e).abs() <= COST_TOLERANCE * e.abs().max(1.0)
                })
        })
}

/// Shortest-path costs from every node to every reachable other node.
pub fn shortest_paths(
    nodes: &[NodeName],
    edges: &[(NodeName, NodeName, f64)],
) -> BTreeMap<NodeName, DistanceVector> {
    nodes
        .iter()
        .map(|source| (source.clone(), from_source(source, nodes, edges)))
        .collect()
}

fn from_source(
    source: &NodeName,
    nodes: &[NodeName],
    edges: &[(NodeName, NodeName, f64)],
) -> DistanceVector {
    let mut dist: BTreeMap<&NodeName, f64> = nodes.iter().map(|n| (n, f64::INFINITY)).collect();
    dist.insert(source, 0.0);

    // At most |V| - 1 rounds; stop early once a round changes nothing.
    for _ in 1..nodes.len() {
        let mut changed = false;

        for (a, b, cost) in edges {
            for (u, v) in [(a, b), (b, a)] {
                let via = dist.get(u).copied().unwrap_or(f64::INFINITY) + cost;
                let current = dist.get(v).copied().unwrap_or(f64::INFINITY);
                if via < current {
                    dist.insert(v, via);
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    dist.into_iter()
        .filter(|(dest, cost)| *dest != source && cost.is_finite())
        .map(|(dest, cost)| (dest.clone(), cost))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<NodeName> {
        list.iter().map(|n| NodeName::from(*n)).collect()
    }

    fn edge(a: &str, b: &str, cost: f64) -> (NodeName, NodeName, f64) {
        (a.into(), b.into(), cost)
    }

    #[test]
    fn test_five_node_topology() {
        let nodes = names(&["A", "B", "C", "D", "E"]);
        let edges = vec![
            edge("A", "C", 1.0),
            edge("B", "C", 4.0),
            edge("C", "E", 1.0),
            edge("B", "E", 1.0),
            edge("C", "D", 3.0),
            edge("D", "E", 1.0),
        ];

        let table = shortest_paths(&nodes, &edges);

        assert_eq!(table["A"].get("E"), Some(2.0));
        assert_eq!(table["B"].get("D"), Some(2.0));
        assert_eq!(table["C"].get("B"), Some(2.0));
        assert_eq!(table["A"].get("B"), Some(3.0));
        assert_eq!(table["A"].get("A"), None);
        assert_eq!(table["D"].len(), 4);
    }

    #[test]
    fn test_unreachable_nodes_are_omitted() {
        let nodes = names(&["A", "B", "C"]);
        let edges = vec![edge("A", "B", 1.0)];

        let table = shortest_paths(&nodes, &edges);

        assert_eq!(table["A"].get("B"), Some(1.0));
        assert_eq!(table["A"].get("C"), None);
        assert!(table["C"].is_empty());
    }

    #[test]
    fn test_tables_match_tolerates_summation_order() {
        let nodes = names(&["A", "B", "C", "D"]);
        let edges = vec![edge("A", "B", 0.1), edge("B", "C", 0.2), edge("C", "D", 0.3)];
        let reference = shortest_paths(&nodes, &edges);

        // D learns A as 0.3 + (0.2 + 0.1); the reference sums (0.3 + 0.2) + 0.1.
        let mut distributed = reference.clone();
        let d_to_a = 0.3 + (0.2 + 0.1);
        assert_ne!(d_to_a, reference["D"].cost_to("A"));
        distributed.get_mut("D").unwrap().insert("A".into(), d_to_a);

        assert!(tables_match(&distributed, &reference));
    }

    #[test]
    fn test_tables_match_rejects_real_differences() {
        let nodes = names(&["A", "B", "C"]);
        let edges = vec![edge("A", "B", 1.0), edge("B", "C", 1.0)];
        let reference = shortest_paths(&nodes, &edges);

        let mut worse = reference.clone();
        worse.get_mut("A").unwrap().insert("C".into(), 2.5);
        assert!(!tables_match(&worse, &reference));

        let mut missing = reference.clone();
        missing.insert("A".into(), DistanceVector::new());
        assert!(!tables_match(&missing, &reference));
    }

    #[test]
    fn test_zero_cost_edges() {
        let nodes = names(&["A", "B", "C"]);
        let edges = vec![edge("A", "B", 0.0), edge("B", "C", 0.0)];

        let table = shortest_paths(&nodes, &edges);
        assert_eq!(table["A"].get("C"), Some(0.0));
    }
}

//! Distance vectors and the Bellman-Ford relaxation step.
//!
//! # Invariants
//!
//! - Entries only ever decrease; [`DistanceVector::relax`] never worsens a cost
//! - A node never relaxes an entry for its own name
//! - Absent destinations are treated as unreachable (`+inf`)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::NodeName;

/// Mapping from destination to best-known path cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistanceVector {
    costs: BTreeMap<NodeName, f64>,
}

impl DistanceVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Known cost to `dest`, if any.
    pub fn get(&self, dest: &str) -> Option<f64> {
        self.costs.get(dest).copied()
    }

    /// Cost to `dest`, `+inf` when unknown.
    pub fn cost_to(&self, dest: &str) -> f64 {
        self.get(dest).unwrap_or(f64::INFINITY)
    }

    /// Set the cost to `dest` unconditionally.
    pub fn insert(&mut self, dest: NodeName, cost: f64) {
        self.costs.insert(dest, cost);
    }

    /// Number of known destinations.
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    /// Returns true if no destination is known.
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Iterate entries in destination order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeName, f64)> {
        self.costs.iter().map(|(dest, cost)| (dest, *cost))
    }

    /// Merge a neighbor's advertised vector into this one.
    ///
    /// `owner` is the name of the node holding this vector and `via_cost` the
    /// cost of the edge to the advertising neighbor. Every advertised
    /// destination except `owner` yields a candidate `advertised + via_cost`,
    /// which replaces the current entry only when strictly smaller.
    ///
    /// Returns true if any entry changed.
    pub fn relax(&mut self, owner: &NodeName, via_cost: f64, advertised: &DistanceVector) -> bool {
        let mut changed = false;

        for (dest, cost) in advertised.iter() {
            if dest == owner {
                continue;
            }

            let candidate = cost + via_cost;
            if candidate < self.cost_to(dest.as_str()) {
                self.costs.insert(dest.clone(), candidate);
                changed = true;
            }
        }

        changed
    }
}

impl fmt::Display for DistanceVector {
    /// Renders `[dest:cost dest:cost]` with one decimal per cost.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (dest, cost)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{:.1}", dest, cost)?;
        }
        f.write_str("]")
    }
}

impl FromIterator<(NodeName, f64)> for DistanceVector {
    fn from_iter<I: IntoIterator<Item = (NodeName, f64)>>(iter: I) -> Self {
        Self {
            costs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dv(entries: &[(&str, f64)]) -> DistanceVector {
        entries
            .iter()
            .map(|(dest, cost)| (NodeName::from(*dest), *cost))
            .collect()
    }

    #[test]
    fn test_relax_adopts_cheaper_paths() {
        let owner = NodeName::from("A");
        let mut mine = dv(&[("C", 1.0)]);
        let from_c = dv(&[("A", 1.0), ("B", 4.0), ("E", 1.0)]);

        assert!(mine.relax(&owner, 1.0, &from_c));
        assert_eq!(mine.get("B"), Some(5.0));
        assert_eq!(mine.get("E"), Some(2.0));
        assert_eq!(mine.get("C"), Some(1.0));
    }

    #[test]
    fn test_relax_skips_own_entry() {
        let owner = NodeName::from("A");
        let mut mine = DistanceVector::new();
        let from_c = dv(&[("A", 1.0)]);

        assert!(!mine.relax(&owner, 1.0, &from_c));
        assert_eq!(mine.get("A"), None);
    }

    #[test]
    fn test_relax_never_worsens() {
        let owner = NodeName::from("B");
        let mut mine = dv(&[("D", 2.0)]);
        let from_c = dv(&[("D", 3.0)]);

        assert!(!mine.relax(&owner, 4.0, &from_c));
        assert_eq!(mine.get("D"), Some(2.0));
    }

    #[test]
    fn test_relax_equal_cost_is_not_a_change() {
        let owner = NodeName::from("B");
        let mut mine = dv(&[("D", 2.0)]);
        let from_e = dv(&[("D", 1.0)]);

        assert!(!mine.relax(&owner, 1.0, &from_e));
    }

    #[test]
    fn test_cost_to_unknown_is_infinite() {
        assert!(DistanceVector::new().cost_to("Z").is_infinite());
    }

    #[test]
    fn test_display_one_decimal() {
        let v = dv(&[("B", 2.0), ("A", 0.3)]);
        assert_eq!(v.to_string(), "[A:0.3 B:2.0]");
    }
}

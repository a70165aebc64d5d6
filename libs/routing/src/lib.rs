//! # dvsim-routing
//!
//! A simulated network of routing nodes that compute shortest-path costs to
//! every other node with a distributed distance-vector (Bellman-Ford)
//! protocol. No node knows the global topology.
//!
//! ## Architecture
//!
//! ```text
//! Graph (topology coordinator)
//! ├── Supervisor
//! │   └── NodeActor(name)   (owns one distance vector, one mailbox)
//! └── InFlight              (quiescence detection)
//! ```
//!
//! Each node relaxes neighbor advertisements into its own vector and
//! re-advertises whenever something improved. Convergence is observed from
//! the outside, via [`Graph::wait_for_quiescence`] and [`Graph::snapshot`].
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), dvsim_routing::GraphError> {
//! use std::time::Duration;
//! use dvsim_routing::Graph;
//!
//! let mut graph = Graph::new();
//! graph.add_node("A")?;
//! graph.add_node("B")?;
//! graph.add_edge("A", "B", 1.0).await?;
//!
//! graph.broadcast().await;
//! graph.wait_for_quiescence(Duration::from_secs(10)).await?;
//! println!("{}", graph.describe());
//! graph.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod actors;
mod error;
mod graph;
mod inflight;
pub mod latency;
mod name;
pub mod reference;
mod vector;

pub use actors::OverflowPolicy;
pub use error::GraphError;
pub use graph::{Graph, GraphConfig, DEFAULT_MAILBOX_CAPACITY};
pub use inflight::InFlight;
pub use latency::{FixedLatency, JitteredLatency, Latency, NoLatency};
pub use name::NodeName;
pub use vector::DistanceVector;

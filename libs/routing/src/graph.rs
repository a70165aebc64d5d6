//! Topology coordinator.
//!
//! The graph is an arena: it owns one [`NodeActor`] per name (through the
//! supervisor) and keeps only handles to them: the mailbox sender and a
//! read-only view of the node's published vector. Edges are stored by
//! unordered name pair; node actors reference each other only through
//! mailbox handles.
//!
//! Construction is sequential (`add_node`, `add_edge`), then
//! [`Graph::broadcast`] seals the topology and seeds the first wave of
//! advertisements. From then on the nodes run on their own until the
//! protocol goes quiet.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::actors::{ActorHandle, NodeActor, NodeMessage, NodeSettings, OverflowPolicy, Supervisor};
use crate::error::GraphError;
use crate::inflight::InFlight;
use crate::latency::{Latency, NoLatency};
use crate::name::NodeName;
use crate::reference;
use crate::vector::DistanceVector;

/// Mailbox capacity used when none is configured.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Graph-wide protocol configuration.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Bounded capacity of every node's mailbox.
    ///
    /// Any capacity of at least one converges: under
    /// [`OverflowPolicy::Block`] a full mailbox only holds up the sender's
    /// link to that neighbor.
    pub mailbox_capacity: usize,

    /// What happens when an advertisement meets a full mailbox.
    pub overflow: OverflowPolicy,

    /// Simulated per-message latency.
    pub latency: Arc<dyn Latency>,

    /// How long `shutdown` waits for node actors before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            overflow: OverflowPolicy::Block,
            latency: Arc::new(NoLatency),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl GraphConfig {
    /// Set the mailbox capacity (zero is raised to one).
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the full-mailbox policy.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the simulated per-message latency.
    pub fn with_latency(mut self, latency: impl Latency) -> Self {
        self.latency = Arc::new(latency);
        self
    }

    /// Set how long shutdown waits before aborting node actors.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

// =============================================================================
// Graph
// =============================================================================

struct NodeHandle {
    mailbox: ActorHandle<NodeMessage>,
    vector: watch::Receiver<DistanceVector>,
}

/// Owns the nodes and edges of a simulated routing network.
pub struct Graph {
    config: GraphConfig,
    supervisor: Supervisor,
    nodes: BTreeMap<NodeName, NodeHandle>,
    /// Keyed by `(min, max)` name pair.
    edges: BTreeMap<(NodeName, NodeName), f64>,
    in_flight: InFlight,
    dropped: Arc<AtomicU64>,
    sealed: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            supervisor: Supervisor::new(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            in_flight: InFlight::new(),
            dropped: Arc::new(AtomicU64::new(0)),
            sealed: false,
        }
    }

    /// Register a node and start its actor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add_node(&mut self, name: impl Into<NodeName>) -> Result<(), GraphError> {
        let name = name.into();

        if self.sealed {
            return Err(GraphError::TopologySealed);
        }
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }

        let settings = NodeSettings {
            latency: Arc::clone(&self.config.latency),
            overflow: self.config.overflow,
            in_flight: self.in_flight.clone(),
            dropped: Arc::clone(&self.dropped),
        };
        let (actor, vector) = NodeActor::new(name.clone(), settings);
        let mailbox = self.supervisor.spawn(actor, self.config.mailbox_capacity);

        debug!(node = %name, actor_id = %mailbox.actor_id(), "Node added");
        self.nodes.insert(name, NodeHandle { mailbox, vector });
        Ok(())
    }

    /// Connect two registered nodes with a symmetric edge.
    pub async fn add_edge(
        &mut self,
        from: impl Into<NodeName>,
        to: impl Into<NodeName>,
        cost: f64,
    ) -> Result<(), GraphError> {
        let from = from.into();
        let to = to.into();

        if self.sealed {
            return Err(GraphError::TopologySealed);
        }
        if !cost.is_finite() || cost < 0.0 {
            return Err(GraphError::InvalidCost { cost });
        }
        // -0.0 passes the check above; store it as 0.0.
        let cost = cost + 0.0;
        if from == to {
            return Err(GraphError::SelfEdge(from));
        }

        let from_node = self
            .nodes
            .get(&from)
            .ok_or_else(|| GraphError::UnknownNode(from.clone()))?;
        let to_node = self
            .nodes
            .get(&to)
            .ok_or_else(|| GraphError::UnknownNode(to.clone()))?;

        let key = edge_key(&from, &to);
        if self.edges.contains_key(&key) {
            return Err(GraphError::DuplicateEdge { from, to });
        }

        // Neither endpoint may receive its half of the edge unless both can.
        for (name, node) in [(&from, from_node), (&to, to_node)] {
            if node.mailbox.is_closed() {
                return Err(GraphError::NodeStopped(name.clone()));
            }
        }

        post(
            &self.in_flight,
            &from,
            &from_node.mailbox,
            NodeMessage::Connect {
                peer: to.clone(),
                cost,
                mailbox: to_node.mailbox.clone(),
            },
        )
        .await?;
        post(
            &self.in_flight,
            &to,
            &to_node.mailbox,
            NodeMessage::Connect {
                peer: from.clone(),
                cost,
                mailbox: from_node.mailbox.clone(),
            },
        )
        .await?;

        debug!(from = %from, to = %to, cost, "Edge added");
        self.edges.insert(key, cost);
        Ok(())
    }

    /// Seal the topology and ask every node to advertise its vector.
    ///
    /// Nodes never advertise on their own; this seeds the first wave.
    /// Calling it again after convergence triggers another full round.
    pub async fn broadcast(&mut self) {
        if !self.sealed {
            info!(nodes = self.nodes.len(), edges = self.edges.len(), "Sealing topology");
            self.sealed = true;
        }

        for (name, node) in &self.nodes {
            if let Err(e) = post(&self.in_flight, name, &node.mailbox, NodeMessage::Advertise).await {
                warn!(node = %name, error = %e, "Failed to trigger advertisement");
            }
        }
    }

    /// Wait until no message is queued or being processed anywhere.
    pub async fn wait_for_quiescence(&self, timeout: Duration) -> Result<(), GraphError> {
        self.in_flight.wait_idle(timeout).await?;
        debug!("Protocol is quiescent");
        Ok(())
    }

    /// One line per node: `Node: A, Neighbors: [C:1.0 E:2.0]`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (name, node) in &self.nodes {
            out.push_str(&format!("Node: {}, Neighbors: {}\n", name, *node.vector.borrow()));
        }
        out
    }

    /// Current vector of every node.
    pub fn snapshot(&self) -> BTreeMap<NodeName, DistanceVector> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.vector.borrow().clone()))
            .collect()
    }

    /// Current vector of one node.
    pub fn vector(&self, name: &str) -> Option<DistanceVector> {
        self.nodes.get(name).map(|node| node.vector.borrow().clone())
    }

    /// Shortest-path table computed centrally over the same topology.
    pub fn reference_table(&self) -> BTreeMap<NodeName, DistanceVector> {
        let nodes: Vec<NodeName> = self.nodes.keys().cloned().collect();
        let edges: Vec<(NodeName, NodeName, f64)> = self
            .edges()
            .map(|(a, b, cost)| (a.clone(), b.clone(), cost))
            .collect();
        reference::shortest_paths(&nodes, &edges)
    }

    /// Every edge once, as `(a, b, cost)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeName, &NodeName, f64)> {
        self.edges.iter().map(|((a, b), cost)| (a, b, *cost))
    }

    /// Direct neighbors of `name` with their edge costs.
    pub fn neighbors(&self, name: &str) -> Vec<(NodeName, f64)> {
        self.edges()
            .filter_map(|(a, b, cost)| {
                if a.as_str() == name {
                    Some((b.clone(), cost))
                } else if b.as_str() == name {
                    Some((a.clone(), cost))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Registered node names in order.
    pub fn node_names(&self) -> impl Iterator<Item = &NodeName> {
        self.nodes.keys()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true once the first broadcast has happened.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Messages enqueued but not yet fully handled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Advertisements discarded under [`OverflowPolicy::Drop`].
    pub fn dropped_advertisements(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of node actors still running.
    pub fn running_nodes(&self) -> usize {
        self.supervisor.running_count()
    }

    /// Stop every node actor and wait for them to exit.
    pub async fn shutdown(mut self) {
        info!(nodes = self.nodes.len(), "Shutting down graph");
        self.supervisor.stop_all(self.config.shutdown_grace).await;
    }
}

fn edge_key(a: &NodeName, b: &NodeName) -> (NodeName, NodeName) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Enqueue a coordinator message, keeping in-flight accounting balanced.
async fn post(
    in_flight: &InFlight,
    name: &NodeName,
    mailbox: &ActorHandle<NodeMessage>,
    msg: NodeMessage,
) -> Result<(), GraphError> {
    in_flight.begin();
    mailbox.send(msg).await.map_err(|_| {
        in_flight.finish();
        GraphError::NodeStopped(name.clone())
    })
}

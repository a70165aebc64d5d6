//! Node actor - one routing node running the distance-vector protocol.
//!
//! The NodeActor:
//! - Exclusively owns its distance vector; the outside world only sees
//!   read-only snapshots published through a watch channel
//! - Learns its neighbors (and their edge costs) from `Connect` messages sent
//!   during topology construction
//! - Relaxes every incoming advertisement, waits the simulated latency, and
//!   re-advertises to all neighbors when anything improved
//! - Never waits on a neighbor's mailbox inside a handler: under
//!   [`OverflowPolicy::Block`] each neighbor is fed by its own link task,
//!   which queues advertisements in order and waits for mailbox space
//!
//! ## State Machine
//!
//! ```text
//! listening -> relax -> (changed) -> advertise -> listening
//!                 |
//!                 +----> (unchanged) ----------> listening
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use super::framework::{Actor, ActorContext, ActorError, ActorHandle, Delivery, OverflowPolicy};
use crate::inflight::InFlight;
use crate::latency::Latency;
use crate::name::NodeName;
use crate::vector::DistanceVector;

// =============================================================================
// Messages
// =============================================================================

/// Messages handled by NodeActor.
#[derive(Debug)]
pub enum NodeMessage {
    /// Record a direct edge to `peer`. Sent once per endpoint at construction.
    Connect {
        peer: NodeName,
        cost: f64,
        mailbox: ActorHandle<NodeMessage>,
    },

    /// Send the current vector to every neighbor.
    Advertise,

    /// A neighbor's complete vector.
    Advertisement {
        from: NodeName,
        vector: Arc<DistanceVector>,
    },
}

// =============================================================================
// Settings
// =============================================================================

/// Graph-wide knobs shared by every node actor.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Delay applied after each advertisement is processed.
    pub latency: Arc<dyn Latency>,

    /// Behavior when a neighbor's mailbox is full.
    pub overflow: OverflowPolicy,

    /// In-flight accounting for quiescence detection.
    pub in_flight: InFlight,

    /// Advertisements discarded under [`OverflowPolicy::Drop`].
    pub dropped: Arc<AtomicU64>,
}

// =============================================================================
// Node Actor
// =============================================================================

#[derive(Debug)]
struct Neighbor {
    /// Edge cost; written once by `Connect`.
    cost: f64,
    route: Route,
}

/// How advertisements reach one neighbor.
#[derive(Debug)]
enum Route {
    /// Straight into the mailbox; a full mailbox drops the message.
    Direct(ActorHandle<NodeMessage>),
    /// Through a link task that waits for mailbox space.
    Link(mpsc::UnboundedSender<NodeMessage>),
}

/// Forward queued advertisements to `mailbox` in order, waiting for space.
///
/// Runs until the sending node stops or shutdown is signaled.
async fn run_link(
    mut queue: mpsc::UnboundedReceiver<NodeMessage>,
    mailbox: ActorHandle<NodeMessage>,
    mut shutdown: watch::Receiver<bool>,
    in_flight: InFlight,
) {
    loop {
        let msg = tokio::select! {
            biased;

            _ = stopped(&mut shutdown) => break,
            msg = queue.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        tokio::select! {
            biased;

            _ = stopped(&mut shutdown) => {
                in_flight.finish();
                break;
            }
            result = mailbox.send(msg) => {
                if let Err(e) = result {
                    in_flight.finish();
                    warn!(peer = %mailbox.actor_id(), error = %e, "Link closed, advertisement lost");
                }
            }
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Actor running the protocol for a single node.
pub struct NodeActor {
    name: NodeName,
    neighbors: BTreeMap<NodeName, Neighbor>,
    vector: DistanceVector,
    published: watch::Sender<DistanceVector>,
    settings: NodeSettings,
}

impl NodeActor {
    /// Create a node with an empty vector and no neighbors.
    ///
    /// Returns the actor and a receiver that always holds its latest vector.
    pub fn new(name: NodeName, settings: NodeSettings) -> (Self, watch::Receiver<DistanceVector>) {
        let (published, snapshot) = watch::channel(DistanceVector::new());
        let actor = Self {
            name,
            neighbors: BTreeMap::new(),
            vector: DistanceVector::new(),
            published,
            settings,
        };
        (actor, snapshot)
    }

    fn publish(&self) {
        self.published.send_replace(self.vector.clone());
    }

    // -------------------------------------------------------------------------
    // Message Handlers
    // -------------------------------------------------------------------------

    fn handle_connect(
        &mut self,
        peer: NodeName,
        cost: f64,
        mailbox: ActorHandle<NodeMessage>,
        shutdown: watch::Receiver<bool>,
    ) {
        debug!(node = %self.name, peer = %peer, cost, "Edge added");

        let route = match self.settings.overflow {
            OverflowPolicy::Drop => Route::Direct(mailbox),
            OverflowPolicy::Block => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_link(rx, mailbox, shutdown, self.settings.in_flight.clone()));
                Route::Link(tx)
            }
        };

        self.vector.insert(peer.clone(), cost);
        self.neighbors.insert(peer, Neighbor { cost, route });
        self.publish();
    }

    async fn handle_advertisement(
        &mut self,
        from: NodeName,
        advertised: Arc<DistanceVector>,
        ctx: &mut ActorContext,
    ) -> Result<bool, ActorError> {
        let Some(via_cost) = self.neighbors.get(&from).map(|n| n.cost) else {
            warn!(node = %self.name, from = %from, "Ignoring advertisement from non-neighbor");
            return Ok(true);
        };

        debug!(node = %self.name, from = %from, "Received advertisement");

        let changed = self.vector.relax(&self.name, via_cost, &advertised);
        if changed {
            self.publish();
        }

        // Mimic network/processing delay before reacting.
        let delay = self.settings.latency.delay();
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.shutdown_signaled() => return Ok(false),
            }
        }
        trace!(node = %self.name, delay_ms = delay.as_millis() as u64, "Processed advertisement");

        if !changed {
            return Ok(true);
        }

        debug!(node = %self.name, vector = %self.vector, "Vector changed, advertising to neighbors");
        self.advertise();
        Ok(true)
    }

    /// Send the complete current vector to every neighbor.
    fn advertise(&self) {
        let vector = Arc::new(self.vector.clone());
        let in_flight = &self.settings.in_flight;

        for (peer, neighbor) in &self.neighbors {
            let msg = NodeMessage::Advertisement {
                from: self.name.clone(),
                vector: Arc::clone(&vector),
            };

            in_flight.begin();
            let delivery = match &neighbor.route {
                Route::Direct(mailbox) => mailbox.offer(msg),
                Route::Link(link) => link
                    .send(msg)
                    .map(|()| Delivery::Enqueued)
                    .map_err(|_| ActorError::ActorStopped),
            };

            match delivery {
                Ok(Delivery::Enqueued) => {
                    trace!(node = %self.name, peer = %peer, "Sent vector");
                }
                Ok(Delivery::Dropped) => {
                    in_flight.finish();
                    self.settings.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(node = %self.name, peer = %peer, "Neighbor mailbox full, advertisement dropped");
                }
                Err(e) => {
                    in_flight.finish();
                    warn!(node = %self.name, peer = %peer, error = %e, "Failed to advertise to neighbor");
                }
            }
        }
    }
}

#[async_trait]
impl Actor for NodeActor {
    type Message = NodeMessage;

    fn name(&self) -> &str {
        "node"
    }

    async fn handle(&mut self, msg: NodeMessage, ctx: &mut ActorContext) -> Result<bool, ActorError> {
        let _done = self.settings.in_flight.finish_on_drop();

        match msg {
            NodeMessage::Connect { peer, cost, mailbox } => {
                self.handle_connect(peer, cost, mailbox, ctx.shutdown.clone());
                Ok(true)
            }
            NodeMessage::Advertise => {
                debug!(node = %self.name, neighbors = self.neighbors.len(), "Advertising on request");
                self.advertise();
                Ok(true)
            }
            NodeMessage::Advertisement { from, vector } => {
                self.handle_advertisement(from, vector, ctx).await
            }
        }
    }

    async fn on_start(&mut self, ctx: &mut ActorContext) -> Result<(), ActorError> {
        debug!(node = %self.name, actor_id = %ctx.actor_id, "Listening for change");
        Ok(())
    }

    async fn on_stop(&mut self, ctx: &mut ActorContext) {
        debug!(
            node = %self.name,
            messages_processed = ctx.messages_processed,
            destinations = self.vector.len(),
            "Node stopped"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

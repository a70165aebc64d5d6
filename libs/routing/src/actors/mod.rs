//! Actor framework and the routing node actor.
//!
//! ## Design Principles
//!
//! - **One actor per node**: each actor owns the distance vector of a single
//!   routing node; nothing else writes it
//! - **Message passing only**: neighbors influence each other exclusively
//!   through bounded mailboxes
//! - **Explicit lifetime**: every actor listens for a shutdown signal and
//!   stops when its supervisor asks (or disappears)

mod framework;
mod node;

pub use framework::{
    Actor, ActorContext, ActorError, ActorHandle, ActorRef, Delivery, Message, OverflowPolicy,
    Supervisor,
};
pub use node::{NodeActor, NodeMessage, NodeSettings};

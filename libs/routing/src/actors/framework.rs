//! Core actor framework types and traits.
//!
//! Provides the building blocks the routing nodes run on:
//! - `Actor` trait for defining actor behavior
//! - `ActorHandle` for sending messages into a bounded mailbox
//! - `OverflowPolicy` for what a full mailbox does to its senders
//! - `Supervisor` for spawning actors and stopping them deterministically

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

// =============================================================================
// Core Traits
// =============================================================================

/// Marker trait for actor messages.
pub trait Message: Send + Debug + 'static {}

impl<T: Send + Debug + 'static> Message for T {}

/// The Actor trait defines behavior for an actor.
///
/// Actors:
/// - Process messages one at a time (no internal concurrency)
/// - Own mutable state not shared with other actors
/// - Communicate only via message passing
#[async_trait]
pub trait Actor: Send + 'static {
    /// The message type this actor handles.
    type Message: Message;

    /// Actor type name for logging.
    fn name(&self) -> &str;

    /// Handle a single message.
    ///
    /// Returns `Ok(true)` to continue, `Ok(false)` to stop, or `Err` on failure.
    async fn handle(&mut self, msg: Self::Message, ctx: &mut ActorContext) -> Result<bool, ActorError>;

    /// Called when the actor starts.
    async fn on_start(&mut self, _ctx: &mut ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called when the actor is about to stop.
    async fn on_stop(&mut self, _ctx: &mut ActorContext) {}
}

/// Context provided to actors during message handling.
pub struct ActorContext {
    /// Actor's unique ID.
    pub actor_id: String,

    /// Shutdown signal receiver.
    pub shutdown: watch::Receiver<bool>,

    /// Message counter.
    pub messages_processed: u64,
}

impl ActorContext {
    /// Create a new actor context.
    pub fn new(actor_id: String, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            actor_id,
            shutdown,
            messages_processed: 0,
        }
    }

    /// Resolve once shutdown is signaled or the supervisor is gone.
    pub async fn shutdown_signaled(&mut self) {
        let _ = self.shutdown.wait_for(|stop| *stop).await;
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in actors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// Actor mailbox is full.
    #[error("mailbox full")]
    MailboxFull,

    /// Actor has stopped.
    #[error("actor stopped")]
    ActorStopped,
}

// =============================================================================
// Mailbox overflow
// =============================================================================

/// What a sender experiences when the receiving mailbox is at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait until the receiver frees a slot.
    ///
    /// Node actors never wait inside their handlers: a blocking advertisement
    /// is parked on a per-neighbor link task instead, so two full mailboxes
    /// cannot stall each other.
    #[default]
    Block,
    /// Discard the message and carry on.
    Drop,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop" => Ok(Self::Drop),
            other => Err(format!("unknown overflow policy '{}' (expected block or drop)", other)),
        }
    }
}

/// Outcome of [`ActorHandle::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message is in the receiver's mailbox.
    Enqueued,
    /// The mailbox was full and the message was discarded.
    Dropped,
}

// =============================================================================
// Actor Handle
// =============================================================================

/// Handle for sending messages to an actor.
pub struct ActorHandle<M: Message> {
    /// Sender for the actor's mailbox.
    tx: mpsc::Sender<M>,

    /// Actor ID for logging.
    actor_id: String,
}

impl<M: Message> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            actor_id: self.actor_id.clone(),
        }
    }
}

impl<M: Message> Debug for ActorHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("actor_id", &self.actor_id)
            .finish()
    }
}

impl<M: Message> ActorHandle<M> {
    /// Wrap an existing mailbox sender.
    pub fn new(tx: mpsc::Sender<M>, actor_id: impl Into<String>) -> Self {
        Self {
            tx,
            actor_id: actor_id.into(),
        }
    }

    /// Send a message to the actor, waiting for mailbox capacity.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ActorError::ActorStopped)
    }

    /// Try to send a message without blocking.
    pub fn try_send(&self, msg: M) -> Result<(), ActorError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ActorError::MailboxFull,
            mpsc::error::TrySendError::Closed(_) => ActorError::ActorStopped,
        })
    }

    /// Enqueue if there is room, otherwise discard ([`OverflowPolicy::Drop`]).
    pub fn offer(&self, msg: M) -> Result<Delivery, ActorError> {
        match self.try_send(msg) {
            Ok(()) => Ok(Delivery::Enqueued),
            Err(ActorError::MailboxFull) => Ok(Delivery::Dropped),
            Err(e) => Err(e),
        }
    }

    /// Returns true once the receiving actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Get the actor ID.
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }
}

/// Type-erased actor reference for supervision.
pub struct ActorRef {
    /// Task handle.
    task_handle: tokio::task::JoinHandle<()>,

    /// Shutdown sender. Dropping it also stops the actor.
    shutdown_tx: watch::Sender<bool>,
}

impl ActorRef {
    /// Signal the actor to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Check if the actor task is still running.
    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Owns the lifetime of a set of actors.
///
/// Dropping the supervisor drops every shutdown sender, which stops the
/// actors at their next suspension point.
#[derive(Default)]
pub struct Supervisor {
    children: HashMap<String, ActorRef>,
}

impl Supervisor {
    /// Create an empty supervisor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn and supervise an actor with a bounded mailbox.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<A>(&mut self, actor: A, mailbox_size: usize) -> ActorHandle<A::Message>
    where
        A: Actor,
    {
        let actor_id = format!("{}_{}", actor.name(), generate_actor_id());
        let (tx, rx) = mpsc::channel(mailbox_size.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let actor_type = actor.name().to_string();

        let task_handle = tokio::spawn(run_actor_loop(actor, rx, shutdown_rx, actor_id.clone()));

        self.children.insert(
            actor_id.clone(),
            ActorRef {
                task_handle,
                shutdown_tx,
            },
        );

        debug!(actor_id = %actor_id, actor_type = %actor_type, mailbox_size, "Spawned actor");

        ActorHandle { tx, actor_id }
    }

    /// Stop all supervised actors, aborting any still running after `grace`.
    pub async fn stop_all(&mut self, grace: Duration) {
        info!(count = self.children.len(), "Stopping all actors");

        for child in self.children.values() {
            child.stop();
        }

        let deadline = tokio::time::Instant::now() + grace;
        for (actor_id, child) in self.children.drain() {
            let ActorRef { mut task_handle, .. } = child;
            if tokio::time::timeout_at(deadline, &mut task_handle).await.is_err() {
                warn!(actor_id = %actor_id, "Force aborting actor");
                task_handle.abort();
            }
        }
    }

    /// Get count of running actors.
    pub fn running_count(&self) -> usize {
        self.children.values().filter(|c| c.is_running()).count()
    }

    /// Number of supervised actors.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if nothing is supervised.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

// =============================================================================
// Actor Loop
// =============================================================================

/// Run the main actor loop.
async fn run_actor_loop<A: Actor>(
    mut actor: A,
    mut rx: mpsc::Receiver<A::Message>,
    shutdown: watch::Receiver<bool>,
    actor_id: String,
) {
    let mut ctx = ActorContext::new(actor_id.clone(), shutdown);

    if let Err(e) = actor.on_start(&mut ctx).await {
        error!(actor_id = %actor_id, error = %e, "Actor failed to start");
        return;
    }

    debug!(actor_id = %actor_id, "Actor started");

    loop {
        tokio::select! {
            biased;

            // A closed channel means the supervisor is gone; stop either way.
            _ = ctx.shutdown_signaled() => {
                debug!(actor_id = %actor_id, "Actor received shutdown signal");
                break;
            }

            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        ctx.messages_processed += 1;

                        match actor.handle(msg, &mut ctx).await {
                            Ok(true) => {}
                            Ok(false) => {
                                debug!(actor_id = %actor_id, "Actor requested stop");
                                break;
                            }
                            Err(e) => {
                                error!(actor_id = %actor_id, error = %e, "Actor error");
                            }
                        }
                    }
                    None => {
                        debug!(actor_id = %actor_id, "Actor mailbox closed");
                        break;
                    }
                }
            }
        }
    }

    actor.on_stop(&mut ctx).await;

    debug!(
        actor_id = %actor_id,
        messages_processed = ctx.messages_processed,
        "Actor stopped"
    );
}

// =============================================================================
// Helpers
// =============================================================================

static ACTOR_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn generate_actor_id() -> u64 {
    ACTOR_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestMessage(String);

    struct Counter {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Actor for Counter {
        type Message = TestMessage;

        fn name(&self) -> &str {
            "counter"
        }

        async fn handle(&mut self, msg: TestMessage, _ctx: &mut ActorContext) -> Result<bool, ActorError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(msg.0 != "stop")
        }
    }

    #[tokio::test]
    async fn test_actor_handle_send() {
        let (tx, mut rx) = mpsc::channel::<TestMessage>(16);
        let handle = ActorHandle::new(tx, "test");

        handle.send(TestMessage("hello".to_string())).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.0, "hello");
    }

    #[tokio::test]
    async fn test_drop_policy_discards_when_full() {
        let (tx, mut rx) = mpsc::channel::<TestMessage>(1);
        let handle = ActorHandle::new(tx, "test");

        let first = handle.offer(TestMessage("a".into())).unwrap();
        let second = handle.offer(TestMessage("b".into())).unwrap();

        assert_eq!(first, Delivery::Enqueued);
        assert_eq!(second, Delivery::Dropped);
        assert_eq!(rx.recv().await.unwrap().0, "a");
    }

    #[tokio::test]
    async fn test_send_waits_for_capacity() {
        let (tx, mut rx) = mpsc::channel::<TestMessage>(1);
        let handle = ActorHandle::new(tx, "test");
        handle.try_send(TestMessage("a".into())).unwrap();

        let sender = handle.clone();
        let pending = tokio::spawn(async move { sender.send(TestMessage("b".into())).await });

        assert_eq!(rx.recv().await.unwrap().0, "a");
        pending.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap().0, "b");
    }

    #[test]
    fn test_send_to_stopped_actor_fails() {
        let (tx, rx) = mpsc::channel::<TestMessage>(1);
        drop(rx);
        let handle = ActorHandle::new(tx, "test");

        let err = handle.offer(TestMessage("a".into())).unwrap_err();
        assert_eq!(err, ActorError::ActorStopped);
        assert!(handle.is_closed());
    }

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!("block".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Block);
        assert_eq!("DROP".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Drop);
        assert!("reject".parse::<OverflowPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_supervisor_runs_and_stops_actors() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new();
        let handle = supervisor.spawn(Counter { seen: Arc::clone(&seen) }, 4);

        handle.send(TestMessage("one".into())).await.unwrap();
        handle.send(TestMessage("two".into())).await.unwrap();

        while seen.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(supervisor.running_count(), 1);

        supervisor.stop_all(Duration::from_secs(1)).await;
        assert!(supervisor.is_empty());
        assert!(handle.send(TestMessage("late".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_actor_can_request_stop() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new();
        let handle = supervisor.spawn(Counter { seen: Arc::clone(&seen) }, 4);

        handle.send(TestMessage("stop".into())).await.unwrap();

        while supervisor.running_count() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(handle.is_closed());
    }
}

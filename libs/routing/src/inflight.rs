//! Graph-wide in-flight message accounting.
//!
//! Every node message is counted from the moment it is enqueued until the
//! receiving actor has finished handling it. A node re-advertises *before*
//! its own message is marked finished, so the count can only reach zero
//! once no mailbox holds work and no handler is running: the protocol's
//! fixed point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::GraphError;

/// Shared counter of enqueued-but-unfinished messages.
#[derive(Debug, Clone)]
pub struct InFlight {
    tx: Arc<watch::Sender<usize>>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlight {
    /// Create a tracker with nothing in flight.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Record a message about to be enqueued.
    pub fn begin(&self) {
        self.tx.send_modify(|n| *n += 1);
    }

    /// Record a message that was handled, dropped or never delivered.
    pub fn finish(&self) {
        self.tx.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Guard that calls [`InFlight::finish`] when dropped.
    pub fn finish_on_drop(&self) -> FinishGuard {
        FinishGuard(self.clone())
    }

    /// Current number of messages in flight.
    pub fn count(&self) -> usize {
        *self.tx.borrow()
    }

    /// Wait until nothing is in flight.
    pub async fn wait_idle(&self, timeout: Duration) -> Result<(), GraphError> {
        let started = Instant::now();
        let mut rx = self.tx.subscribe();

        // The sender lives in `self`, so the channel cannot close here.
        let idle = tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0))
            .await
            .is_ok();

        if idle {
            Ok(())
        } else {
            Err(GraphError::Timeout {
                elapsed: started.elapsed(),
                in_flight: self.count(),
            })
        }
    }
}

/// Marks one message finished on drop, whichever way its handler exits.
#[derive(Debug)]
pub struct FinishGuard(InFlight);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idle_when_nothing_sent() {
        let in_flight = InFlight::new();
        in_flight
            .wait_idle(Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_times_out_while_busy() {
        let in_flight = InFlight::new();
        in_flight.begin();

        let err = in_flight
            .wait_idle(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Timeout { in_flight: 1, .. }));
    }

    #[tokio::test]
    async fn test_wakes_when_last_message_finishes() {
        let in_flight = InFlight::new();
        in_flight.begin();
        in_flight.begin();

        let worker = in_flight.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            worker.finish();
            worker.finish();
        });

        in_flight.wait_idle(Duration::from_secs(5)).await.unwrap();
        assert_eq!(in_flight.count(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_can_run_on_spawned_task() {
        let in_flight = InFlight::new();
        in_flight.begin();

        let waiter = in_flight.clone();
        let idle = tokio::spawn(async move { waiter.wait_idle(Duration::from_secs(5)).await });

        in_flight.finish();
        idle.await.unwrap().unwrap();
    }

    #[test]
    fn test_guard_finishes_on_drop() {
        let in_flight = InFlight::new();
        in_flight.begin();
        {
            let _guard = in_flight.finish_on_drop();
            assert_eq!(in_flight.count(), 1);
        }
        assert_eq!(in_flight.count(), 0);
    }

    #[test]
    fn test_finish_saturates_at_zero() {
        let in_flight = InFlight::new();
        in_flight.finish();
        assert_eq!(in_flight.count(), 0);
    }
}

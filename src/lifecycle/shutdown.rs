//! Shutdown coordination.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Owns the drain deadline alongside the broadcast signal so every
/// subscriber races the same clock: the listeners give in-flight
/// requests up to the deadline, protocol bridges drop their sockets as
/// soon as the signal fires.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    drain_deadline: Duration,
}

impl Shutdown {
    pub fn new(drain_deadline: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, drain_deadline }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
            drain_deadline: self.drain_deadline,
        }
    }

    /// Start the shutdown sequence.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

/// One subscriber's view of the shutdown sequence.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    drain_deadline: Duration,
}

impl ShutdownSignal {
    /// Resolves once shutdown is triggered. A dropped coordinator counts
    /// as triggered: with no sender left, nothing is keeping the process
    /// up.
    pub async fn triggered(&mut self) {
        let _ = self.rx.recv().await;
    }

    /// A fresh signal for a task spawned after this one.
    pub fn resubscribe(&self) -> Self {
        Self {
            rx: self.rx.resubscribe(),
            drain_deadline: self.drain_deadline,
        }
    }

    /// Run `drained` for at most the drain deadline. Returns whether it
    /// finished in time.
    pub async fn drain<F>(&self, drained: F) -> bool
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = drained => true,
            _ = tokio::time::sleep(self.drain_deadline) => false,
        }
    }
}

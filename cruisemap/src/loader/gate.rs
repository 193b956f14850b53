//! Gate between batched first-stage fetches and per-cruise stage fetches.
//!
//! While any first-stage batch is in flight the gate is closed, and the
//! [`PriorityFetchQueue`](super::PriorityFetchQueue) holds back its dispatch
//! until the gate opens again.

use std::sync::Arc;

use tokio::sync::watch;

/// Counts in-flight batches; open when the count is zero.
#[derive(Clone)]
pub struct BatchGate {
    in_flight: Arc<watch::Sender<usize>>,
}

/// Keeps the gate closed until dropped.
pub struct GateGuard {
    in_flight: Arc<watch::Sender<usize>>,
}

impl BatchGate {
    pub fn new() -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            in_flight: Arc::new(in_flight),
        }
    }

    /// Closes the gate for the lifetime of the returned guard.
    pub fn enter(&self) -> GateGuard {
        self.in_flight.send_modify(|n| *n += 1);
        GateGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        *self.in_flight.borrow() == 0
    }

    /// Number of batches currently holding the gate.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Completes once no batch is in flight.
    pub async fn opened(&self) {
        let mut receiver = self.in_flight.subscribe();
        let _ = receiver.wait_for(|n| *n == 0).await;
    }
}

impl Default for BatchGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

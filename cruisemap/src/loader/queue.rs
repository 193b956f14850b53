//! Priority queue for incremental route stage fetches.
//!
//! Unlike first-stage geometry, refinement stages are fetched one cruise per
//! request. The queue keeps at most one entry per cruise, runs up to
//! `max_in_flight` fetches at a time, and never dispatches while a batched
//! first-stage request holds the [`BatchGate`].
//!
//! # Priority
//!
//! High-priority entries go to the front of the queue, normal ones to the
//! back. Re-enqueueing a queued cruise with a different priority moves it.
//!
//! # Cancellation
//!
//! [`PriorityFetchQueue::cancel`] only removes queued entries; their futures
//! resolve to `None`. A fetch already in flight always completes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::records::TrackPointRecord;
use crate::api::BoxFuture;

use super::gate::BatchGate;

/// Default number of concurrent stage fetches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// Points delivered for one stage; `None` when the fetch was cancelled.
pub type StagePoints = Option<Arc<Vec<TrackPointRecord>>>;

/// Shared handle to a queued or in-flight stage fetch.
pub type StageFetch = Shared<BoxFuture<'static, StagePoints>>;

/// Loading priority of a cruise route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPriority {
    #[default]
    Normal,
    High,
}

impl LoadPriority {
    pub fn from_high(high: bool) -> Self {
        if high {
            LoadPriority::High
        } else {
            LoadPriority::Normal
        }
    }
}

/// Fetches one stage of one cruise route.
pub trait StageSource: Send + Sync + 'static {
    fn fetch_stage(&self, cruise_id: String, stage: u8) -> BoxFuture<'static, Vec<TrackPointRecord>>;
}

struct QueuedFetch {
    cruise_id: String,
    stage: u8,
    priority: LoadPriority,
    sender: oneshot::Sender<StagePoints>,
    result: StageFetch,
}

struct QueueState {
    queue: VecDeque<QueuedFetch>,
    in_flight: HashMap<String, StageFetch>,
    waiting_for_gate: bool,
}

struct Inner {
    source: Arc<dyn StageSource>,
    max_in_flight: usize,
    gate: BatchGate,
    shutdown: CancellationToken,
    state: Mutex<QueueState>,
}

/// Bounded-concurrency, priority-ordered stage fetch queue.
#[derive(Clone)]
pub struct PriorityFetchQueue {
    inner: Arc<Inner>,
}

impl PriorityFetchQueue {
    pub fn new(source: Arc<dyn StageSource>, max_in_flight: usize, gate: BatchGate) -> Self {
        Self::with_shutdown(source, max_in_flight, gate, CancellationToken::new())
    }

    pub fn with_shutdown(
        source: Arc<dyn StageSource>,
        max_in_flight: usize,
        gate: BatchGate,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                max_in_flight: max_in_flight.max(1),
                gate,
                shutdown,
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    in_flight: HashMap::new(),
                    waiting_for_gate: false,
                }),
            }),
        }
    }

    /// Queues a fetch of `stage` for `cruise_id`.
    ///
    /// - cruise in flight: returns the in-flight fetch, queues nothing
    /// - cruise queued: moves it if `priority` differs, returns its fetch
    /// - otherwise: queues a new entry and tries to dispatch
    pub fn enqueue(&self, cruise_id: &str, stage: u8, priority: LoadPriority) -> StageFetch {
        let result = {
            let mut state = self.inner.state.lock();
            if let Some(fetch) = state.in_flight.get(cruise_id) {
                return fetch.clone();
            }
            if let Some(fetch) = reprioritize_locked(&mut state, cruise_id, priority) {
                return fetch;
            }

            let (sender, receiver) = oneshot::channel();
            let result: StageFetch = async move { receiver.await.ok().flatten() }.boxed().shared();
            let entry = QueuedFetch {
                cruise_id: cruise_id.to_string(),
                stage,
                priority,
                sender,
                result: result.clone(),
            };
            debug!(cruise_id, stage, ?priority, "Queued stage fetch");
            place(&mut state.queue, entry);
            result
        };

        dispatch(&self.inner);
        result
    }

    /// Changes the priority of a queued entry. Returns false if the cruise
    /// is not queued.
    pub fn reprioritize(&self, cruise_id: &str, priority: LoadPriority) -> bool {
        let mut state = self.inner.state.lock();
        reprioritize_locked(&mut state, cruise_id, priority).is_some()
    }

    /// Removes a queued entry; its fetch resolves to `None`.
    ///
    /// Returns false if the cruise was not queued (possibly in flight).
    pub fn cancel(&self, cruise_id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state.lock();
            let position = state.queue.iter().position(|e| e.cruise_id == cruise_id);
            position.and_then(|pos| state.queue.remove(pos))
        };
        match removed {
            Some(entry) => {
                debug!(cruise_id, stage = entry.stage, "Cancelled queued stage fetch");
                true
            }
            None => false,
        }
    }

    /// Drops every queued entry.
    pub fn clear(&self) {
        self.inner.state.lock().queue.clear();
    }

    /// Queued cruise ids, front first.
    pub fn queued_ids(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .queue
            .iter()
            .map(|e| e.cruise_id.clone())
            .collect()
    }

    pub fn is_queued(&self, cruise_id: &str) -> bool {
        self.inner.state.lock().queue.iter().any(|e| e.cruise_id == cruise_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }
}

fn place(queue: &mut VecDeque<QueuedFetch>, entry: QueuedFetch) {
    match entry.priority {
        LoadPriority::High => queue.push_front(entry),
        LoadPriority::Normal => queue.push_back(entry),
    }
}

fn reprioritize_locked(state: &mut QueueState, cruise_id: &str, priority: LoadPriority) -> Option<StageFetch> {
    let position = state.queue.iter().position(|e| e.cruise_id == cruise_id)?;
    let result = state.queue[position].result.clone();
    if state.queue[position].priority != priority {
        if let Some(mut entry) = state.queue.remove(position) {
            debug!(cruise_id, ?priority, "Reprioritized stage fetch");
            entry.priority = priority;
            place(&mut state.queue, entry);
        }
    }
    Some(result)
}

/// Starts fetches while capacity remains and the gate is open.
fn dispatch(inner: &Arc<Inner>) {
    let mut started = Vec::new();
    {
        let mut state = inner.state.lock();
        if inner.shutdown.is_cancelled() {
            state.queue.clear();
            return;
        }
        if state.queue.is_empty() {
            return;
        }
        if !inner.gate.is_open() {
            if !state.waiting_for_gate {
                state.waiting_for_gate = true;
                let inner = inner.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = inner.shutdown.cancelled() => {}
                        _ = inner.gate.opened() => {}
                    }
                    inner.state.lock().waiting_for_gate = false;
                    dispatch(&inner);
                });
            }
            return;
        }

        while state.in_flight.len() < inner.max_in_flight {
            let Some(entry) = state.queue.pop_front() else {
                break;
            };
            state.in_flight.insert(entry.cruise_id.clone(), entry.result.clone());
            started.push(entry);
        }
    }

    for entry in started {
        let inner = inner.clone();
        tokio::spawn(async move {
            debug!(cruise_id = %entry.cruise_id, stage = entry.stage, "Fetching route stage");
            let points = inner
                .source
                .fetch_stage(entry.cruise_id.clone(), entry.stage)
                .await;
            // Free the slot before waking waiters so a chained enqueue for
            // the next stage does not see this fetch as still in flight.
            inner.state.lock().in_flight.remove(&entry.cruise_id);
            let _ = entry.sender.send(Some(Arc::new(points)));
            dispatch(&inner);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct RecordingStages {
        calls: Mutex<Vec<(String, u8)>>,
        latency: Duration,
    }

    impl RecordingStages {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                latency,
            })
        }

        fn calls(&self) -> Vec<(String, u8)> {
            self.calls.lock().clone()
        }
    }

    impl StageSource for RecordingStages {
        fn fetch_stage(&self, cruise_id: String, stage: u8) -> BoxFuture<'static, Vec<TrackPointRecord>> {
            self.calls.lock().push((cruise_id, stage));
            let latency = self.latency;
            Box::pin(async move {
                tokio::time::sleep(latency).await;
                Vec::new()
            })
        }
    }

    fn queue(source: Arc<RecordingStages>, gate: BatchGate) -> PriorityFetchQueue {
        PriorityFetchQueue::new(source, DEFAULT_MAX_IN_FLIGHT, gate)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap() {
        let source = RecordingStages::new(Duration::from_millis(100));
        let queue = queue(source.clone(), BatchGate::new());

        let fetches: Vec<_> = (0..7)
            .map(|i| queue.enqueue(&format!("c{}", i), 2, LoadPriority::Normal))
            .collect();

        assert_eq!(queue.in_flight_count(), 5);
        assert_eq!(queue.queued_ids(), vec!["c5", "c6"]);

        for fetch in fetches {
            assert!(fetch.await.is_some());
        }
        assert_eq!(source.calls().len(), 7);
        assert_eq!(queue.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_jumps_ahead() {
        let source = RecordingStages::new(Duration::from_millis(100));
        let gate = BatchGate::new();
        let guard = gate.enter();
        let queue = queue(source.clone(), gate);

        queue.enqueue("a", 2, LoadPriority::Normal);
        queue.enqueue("b", 2, LoadPriority::Normal);
        queue.enqueue("c", 2, LoadPriority::Normal);
        queue.enqueue("c", 2, LoadPriority::High);

        assert_eq!(queue.queued_ids(), vec!["c", "a", "b"]);

        // Demotion moves back to the tail.
        queue.enqueue("c", 2, LoadPriority::Normal);
        assert_eq!(queue.queued_ids(), vec!["a", "b", "c"]);
        assert!(queue.reprioritize("b", LoadPriority::High));
        assert_eq!(queue.queued_ids(), vec!["b", "a", "c"]);

        drop(guard);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let order: Vec<String> = source.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_entry_per_cruise() {
        let source = RecordingStages::new(Duration::from_millis(100));
        let queue = queue(source.clone(), BatchGate::new());

        let first = queue.enqueue("a", 2, LoadPriority::Normal);
        // In flight now: the same fetch comes back, nothing new is queued.
        let second = queue.enqueue("a", 3, LoadPriority::High);

        assert!(queue.queued_ids().is_empty());
        first.await;
        second.await;
        assert_eq!(source.calls(), vec![("a".to_string(), 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_defers_dispatch() {
        let source = RecordingStages::new(Duration::ZERO);
        let gate = BatchGate::new();
        let guard = gate.enter();
        let queue = queue(source.clone(), gate);

        let fetch = queue.enqueue("a", 2, LoadPriority::Normal);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(source.calls().is_empty());

        drop(guard);
        assert!(fetch.await.is_some());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_queued_resolves_none() {
        let source = RecordingStages::new(Duration::ZERO);
        let gate = BatchGate::new();
        let guard = gate.enter();
        let queue = queue(source.clone(), gate);

        let fetch = queue.enqueue("a", 2, LoadPriority::Normal);
        assert!(queue.cancel("a"));
        assert!(!queue.cancel("a"));
        assert!(fetch.await.is_none());

        drop(guard);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(source.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_is_noop() {
        let source = RecordingStages::new(Duration::from_millis(100));
        let queue = queue(source.clone(), BatchGate::new());

        let fetch = queue.enqueue("a", 2, LoadPriority::Normal);
        assert!(!queue.cancel("a"));
        assert!(fetch.await.is_some());
    }
}

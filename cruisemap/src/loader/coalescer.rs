//! Request coalescing.
//!
//! [`BatchCoalescer`] collects keys requested within a short window and sends
//! them to its [`BatchSource`] as one batch, then fans the keyed response out
//! to every waiter. A key missing from the response resolves to `V::default()`.
//!
//! # Example
//!
//! ```ignore
//! let coalescer = BatchCoalescer::new("points", source, CoalescerConfig::default());
//!
//! // Both ids go out in the same request.
//! let (a, b) = tokio::join!(coalescer.request("101"), coalescer.request("102"));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::BoxFuture;

use super::gate::BatchGate;

/// Default collection window (10 ms).
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 10;

/// Default maximum number of keys per batch.
pub const DEFAULT_MAX_BATCH: usize = 50;

/// Fetches values for a batch of keys.
pub trait BatchSource<V>: Send + Sync + 'static {
    /// Returns the values found, keyed like the request.
    fn fetch(&self, keys: Vec<String>) -> BoxFuture<'static, HashMap<String, V>>;
}

/// Coalescer tuning.
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// How long keys are collected before a batch is sent.
    pub window: Duration,
    /// Keys beyond this stay queued for the next window.
    pub max_batch: usize,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_BATCH_WINDOW_MS),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

/// Batches concurrent keyed requests into windowed bulk fetches.
pub struct BatchCoalescer<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    name: &'static str,
    source: Arc<dyn BatchSource<V>>,
    config: CoalescerConfig,
    gate: Option<BatchGate>,
    shutdown: CancellationToken,
    pending: Mutex<Pending<V>>,
}

struct Pending<V> {
    /// Keys in first-request order.
    order: Vec<String>,
    waiters: HashMap<String, Vec<oneshot::Sender<V>>>,
    window_open: bool,
}

impl<V> BatchCoalescer<V>
where
    V: Clone + Default + Send + 'static,
{
    /// Creates a coalescer. `name` only labels log output.
    pub fn new(name: &'static str, source: Arc<dyn BatchSource<V>>, config: CoalescerConfig) -> Self {
        Self::with_shutdown(name, source, config, None, CancellationToken::new())
    }

    /// Creates a coalescer that holds `gate` closed while each batch is in
    /// flight and resolves pending and future requests with defaults once
    /// `shutdown` fires.
    pub fn with_shutdown(
        name: &'static str,
        source: Arc<dyn BatchSource<V>>,
        config: CoalescerConfig,
        gate: Option<BatchGate>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                source,
                config: CoalescerConfig {
                    max_batch: config.max_batch.max(1),
                    ..config
                },
                gate,
                shutdown,
                pending: Mutex::new(Pending {
                    order: Vec::new(),
                    waiters: HashMap::new(),
                    window_open: false,
                }),
            }),
        }
    }

    /// Requests the value for `key`.
    ///
    /// The key is registered immediately; the returned future only waits for
    /// the batch that carries it. Requesting a key already waiting in the
    /// current window joins that request.
    pub fn request(&self, key: impl Into<String>) -> impl Future<Output = V> + Send + 'static {
        let key = key.into();
        let (sender, receiver) = oneshot::channel();

        if self.inner.shutdown.is_cancelled() {
            drop(sender);
        } else {
            let mut pending = self.inner.pending.lock();
            let waiters = pending.waiters.entry(key.clone()).or_default();
            let is_new = waiters.is_empty();
            waiters.push(sender);
            if is_new {
                pending.order.push(key);
            }
            if !pending.window_open {
                pending.window_open = true;
                tokio::spawn(run_windows(self.inner.clone()));
            }
        }

        async move { receiver.await.unwrap_or_default() }
    }

    /// Number of keys waiting for a window.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().order.len()
    }
}

/// Sends one batch per window until no keys are left.
async fn run_windows<V>(inner: Arc<Inner<V>>)
where
    V: Clone + Default + Send + 'static,
{
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => {
                let mut pending = inner.pending.lock();
                pending.order.clear();
                pending.waiters.clear();
                pending.window_open = false;
                return;
            }
            _ = tokio::time::sleep(inner.config.window) => {}
        }

        let (keys, waiters, more) = {
            let mut pending = inner.pending.lock();
            let take = pending.order.len().min(inner.config.max_batch);
            let keys: Vec<String> = pending.order.drain(..take).collect();
            let waiters: Vec<(String, Vec<oneshot::Sender<V>>)> = keys
                .iter()
                .filter_map(|key| pending.waiters.remove_entry(key))
                .collect();
            let more = !pending.order.is_empty();
            if !more {
                pending.window_open = false;
            }
            (keys, waiters, more)
        };

        if !keys.is_empty() {
            debug!(
                coalescer = inner.name,
                keys = keys.len(),
                deferred = more,
                "Sending batch"
            );
            let guard = inner.gate.as_ref().map(BatchGate::enter);
            let fetch = inner.source.fetch(keys);
            tokio::spawn(async move {
                let mut results = fetch.await;
                for (key, senders) in waiters {
                    let value = results.remove(&key).unwrap_or_default();
                    for sender in senders {
                        let _ = sender.send(value.clone());
                    }
                }
                drop(guard);
            });
        }

        if !more {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes each key's length, skipping keys starting with "missing".
    struct RecordingSource {
        batches: Mutex<Vec<Vec<String>>>,
        latency: Duration,
    }

    impl RecordingSource {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                latency,
            })
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().iter().map(Vec::len).collect()
        }
    }

    impl BatchSource<usize> for RecordingSource {
        fn fetch(&self, keys: Vec<String>) -> BoxFuture<'static, HashMap<String, usize>> {
            self.batches.lock().push(keys.clone());
            let latency = self.latency;
            Box::pin(async move {
                tokio::time::sleep(latency).await;
                keys.into_iter()
                    .filter(|k| !k.starts_with("missing"))
                    .map(|k| {
                        let len = k.len();
                        (k, len)
                    })
                    .collect()
            })
        }
    }

    fn coalescer(source: Arc<RecordingSource>) -> BatchCoalescer<usize> {
        BatchCoalescer::new("test", source, CoalescerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_in_one_window_share_a_batch() {
        let source = RecordingSource::new(Duration::ZERO);
        let coalescer = coalescer(source.clone());

        let a = coalescer.request("a");
        let bb = coalescer.request("bb");
        let again = coalescer.request("a");

        assert_eq!(a.await, 1);
        assert_eq!(bb.await, 2);
        assert_eq!(again.await, 1);
        assert_eq!(source.batch_sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixty_ids_go_out_as_fifty_plus_ten() {
        let source = RecordingSource::new(Duration::from_millis(100));
        let coalescer = coalescer(source.clone());

        let requests: Vec<_> = (0..60).map(|i| coalescer.request(format!("cruise-{}", i))).collect();
        let results = futures::future::join_all(requests).await;

        assert_eq!(results.len(), 60);
        assert_eq!(results[0], "cruise-0".len());
        assert_eq!(source.batch_sizes(), vec![50, 10]);
        assert_eq!(source.batches.lock()[1][0], "cruise-50");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_resolves_default() {
        let source = RecordingSource::new(Duration::ZERO);
        let coalescer = coalescer(source);

        assert_eq!(coalescer.request("missing-1").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_window_gets_separate_batch() {
        let source = RecordingSource::new(Duration::ZERO);
        let coalescer = coalescer(source.clone());

        coalescer.request("first").await;
        coalescer.request("second").await;

        assert_eq!(source.batch_sizes(), vec![1, 1]);
        assert_eq!(coalescer.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_closed_while_batch_in_flight() {
        let source = RecordingSource::new(Duration::from_millis(100));
        let gate = BatchGate::new();
        let coalescer = BatchCoalescer::with_shutdown(
            "test",
            source,
            CoalescerConfig::default(),
            Some(gate.clone()),
            CancellationToken::new(),
        );

        let request = tokio::spawn(coalescer.request("a"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!gate.is_open());

        request.await.unwrap();
        assert!(gate.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_resolves_defaults() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingSource(Arc<AtomicUsize>);
        impl BatchSource<usize> for CountingSource {
            fn fetch(&self, _keys: Vec<String>) -> BoxFuture<'static, HashMap<String, usize>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { HashMap::new() })
            }
        }

        let token = CancellationToken::new();
        let coalescer = BatchCoalescer::with_shutdown(
            "test",
            Arc::new(CountingSource(calls.clone())),
            CoalescerConfig::default(),
            None,
            token.clone(),
        );

        let pending = coalescer.request("a");
        token.cancel();

        assert_eq!(pending.await, 0);
        assert_eq!(coalescer.request("b").await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_and_shutdown_apply_together() {
        let source = RecordingSource::new(Duration::from_millis(100));
        let gate = BatchGate::new();
        let token = CancellationToken::new();
        let coalescer = BatchCoalescer::with_shutdown(
            "test",
            source.clone(),
            CoalescerConfig::default(),
            Some(gate.clone()),
            token.clone(),
        );

        let in_flight = tokio::spawn(coalescer.request("a"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!gate.is_open());

        token.cancel();
        assert_eq!(coalescer.request("bb").await, 0);

        assert_eq!(in_flight.await.unwrap(), 1);
        assert!(gate.is_open());
        assert_eq!(source.batch_sizes(), vec![1]);
    }
}

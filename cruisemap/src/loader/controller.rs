//! Per-cruise staged route loading.
//!
//! A route is loaded in four stages of increasing detail. The controller
//! tracks the highest stage merged so far:
//!
//! | stage | meaning                                                   |
//! |-------|-----------------------------------------------------------|
//! | 0     | nothing loaded                                            |
//! | 1     | first-stage geometry, fetched in a batch with other cruises |
//! | 2, 3  | refinements merged in from the fetch queue                |
//! | 4     | complete                                                  |
//!
//! Stage 1 is loaded by the first call to [`RouteLoadingController::route`].
//! [`RouteLoadingController::load_track_progressive`] then fetches the next
//! stage through the [`PriorityFetchQueue`](super::PriorityFetchQueue) and
//! keeps chaining until the route is complete or loading is cancelled. At most
//! one stage load is active per cruise; repeated calls join it.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::{FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::api::records::TrackPointRecord;
use crate::api::BoxFuture;
use crate::model::{CruiseRoute, RouteExtras};

use super::queue::LoadPriority;
use super::LoaderContext;

/// Stage of a fully loaded route.
pub const COMPLETE_STAGE: u8 = 4;

/// Route shared between the controller and readers.
pub type SharedRoute = Arc<RwLock<CruiseRoute>>;

struct ActiveLoad {
    generation: u64,
    priority: LoadPriority,
    /// Set once the stage fetch has been handed to the queue.
    enqueued: bool,
    cancelled: bool,
    done: Shared<BoxFuture<'static, ()>>,
}

#[derive(Default)]
struct Progress {
    current: Option<ActiveLoad>,
    generation: u64,
}

/// Drives the staged loading of one cruise route.
pub struct RouteLoadingController {
    cruise_id: String,
    ctx: Arc<LoaderContext>,
    stage: AtomicU8,
    route: OnceCell<SharedRoute>,
    extras: OnceLock<RouteExtras>,
    progress: Mutex<Progress>,
}

impl RouteLoadingController {
    /// Controller for a cruise whose route is loaded on demand.
    pub fn new(cruise_id: impl Into<String>, ctx: Arc<LoaderContext>) -> Self {
        Self {
            cruise_id: cruise_id.into(),
            ctx,
            stage: AtomicU8::new(0),
            route: OnceCell::new(),
            extras: OnceLock::new(),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Controller for a cruise delivered with its complete route.
    pub fn with_route(cruise_id: impl Into<String>, ctx: Arc<LoaderContext>, records: &[TrackPointRecord]) -> Self {
        let controller = Self::new(cruise_id, ctx);
        let (route, extras) = CruiseRoute::from_records(records);
        let _ = controller.route.set(Arc::new(RwLock::new(route)));
        let _ = controller.extras.set(extras);
        controller.stage.store(COMPLETE_STAGE, Ordering::SeqCst);
        controller
    }

    pub fn cruise_id(&self) -> &str {
        &self.cruise_id
    }

    /// Highest stage merged into the route.
    pub fn stage(&self) -> u8 {
        self.stage.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.stage() >= COMPLETE_STAGE
    }

    /// Whether a stage load is active (queued, in flight, or waiting for stage 1).
    pub fn is_loading(&self) -> bool {
        self.progress.lock().current.is_some()
    }

    /// Markers parsed from the first stage, once it is loaded.
    pub fn extras(&self) -> Option<&RouteExtras> {
        self.extras.get()
    }

    /// The route, loading stage 1 on first access.
    pub async fn route(&self) -> SharedRoute {
        self.route
            .get_or_init(|| async {
                let records = self.ctx.route_batches.request(self.cruise_id.clone()).await;
                let (route, extras) = CruiseRoute::from_records(&records);
                debug!(
                    cruise_id = %self.cruise_id,
                    points = route.len(),
                    gateways = extras.gateways.len(),
                    "Loaded first route stage"
                );
                let _ = self.extras.set(extras);
                let _ = self.stage.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst);
                Arc::new(RwLock::new(route))
            })
            .await
            .clone()
    }

    /// Loads the next stage and keeps loading until the route is complete.
    ///
    /// Does nothing unless stage 1 is loaded and the route is incomplete. If a
    /// load is already active, it is resumed (if cancelled) and reprioritized.
    /// The returned future completes when the next stage has been merged or
    /// loading stopped.
    pub fn load_track_progressive(self: &Arc<Self>, priority: LoadPriority) -> impl Future<Output = ()> + Send + 'static {
        let done = self.start_or_join(priority);
        async move {
            if let Some(done) = done {
                done.await;
            }
        }
    }

    /// Changes the priority of a load that has not been dispatched yet.
    pub fn set_high_priority_loading(&self, high: bool) {
        let priority = LoadPriority::from_high(high);
        let mut progress = self.progress.lock();
        if let Some(active) = progress.current.as_mut() {
            self.reprioritize(active, priority);
        }
    }

    /// Stops chaining further stages.
    ///
    /// A queued fetch is dropped; a fetch in flight completes and is merged.
    pub fn cancel_load_track(&self) {
        let mut progress = self.progress.lock();
        let Some(active) = progress.current.as_mut() else {
            return;
        };
        active.cancelled = true;
        if active.enqueued && self.ctx.queue.cancel(&self.cruise_id) {
            debug!(cruise_id = %self.cruise_id, "Cancelled queued route stage");
            progress.current = None;
        }
    }

    fn start_or_join(self: &Arc<Self>, priority: LoadPriority) -> Option<Shared<BoxFuture<'static, ()>>> {
        let stage = self.stage();
        if stage == 0 || stage >= COMPLETE_STAGE {
            return None;
        }

        let mut progress = self.progress.lock();
        if let Some(active) = progress.current.as_mut() {
            active.cancelled = false;
            self.reprioritize(active, priority);
            return Some(active.done.clone());
        }

        progress.generation += 1;
        let generation = progress.generation;
        let task = tokio::spawn(self.clone().run_stage(generation));
        let done: BoxFuture<'static, ()> = Box::pin(async move {
            let _ = task.await;
        });
        let done = done.shared();
        progress.current = Some(ActiveLoad {
            generation,
            priority,
            enqueued: false,
            cancelled: false,
            done: done.clone(),
        });
        Some(done)
    }

    /// Applies `priority` unless the fetch is already in flight.
    fn reprioritize(&self, active: &mut ActiveLoad, priority: LoadPriority) {
        if active.priority == priority {
            return;
        }
        if !active.enqueued || self.ctx.queue.reprioritize(&self.cruise_id, priority) {
            trace!(cruise_id = %self.cruise_id, ?priority, "Route load reprioritized");
            active.priority = priority;
        }
    }

    async fn run_stage(self: Arc<Self>, generation: u64) {
        let route = self.route().await;

        let fetch = {
            let mut progress = self.progress.lock();
            match progress.current.as_mut() {
                Some(active) if active.generation == generation && !active.cancelled => {
                    let next = self.stage() + 1;
                    active.enqueued = true;
                    Some((self.ctx.queue.enqueue(&self.cruise_id, next, active.priority), next))
                }
                _ => None,
            }
        };
        let Some((fetch, next)) = fetch else {
            self.finish(generation);
            return;
        };

        let Some(points) = fetch.await else {
            self.finish(generation);
            return;
        };

        let merged = route.write().merge_records(&points);
        self.stage.fetch_max(next, Ordering::SeqCst);
        debug!(cruise_id = %self.cruise_id, stage = next, merged, "Merged route stage");

        if let Some(priority) = self.finish(generation) {
            if !self.is_complete() {
                let _ = self.start_or_join(priority);
            }
        }
    }

    /// Clears the active load of `generation`. Returns its priority if the
    /// next stage should be chained.
    fn finish(&self, generation: u64) -> Option<LoadPriority> {
        let mut progress = self.progress.lock();
        let is_current = progress
            .current
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if !is_current {
            return None;
        }
        let active = progress.current.take()?;
        (!active.cancelled).then_some(active.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiEndpoint, MockApiClient, RetryPolicy, Transport};
    use crate::config::EngineConfig;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn points_for(stage: u64) -> Value {
        let points: Vec<Value> = (0..3)
            .map(|i| {
                json!({
                    "lat": stage as f64,
                    "lng": i as f64,
                    "arrival": format!("2024-06-01T10:{:02}:00Z", stage * 10 + i),
                    "angle": 0
                })
            })
            .collect();
        Value::Array(points)
    }

    fn mock(latency: Duration) -> Arc<MockApiClient> {
        let client = MockApiClient::new(|endpoint, body| {
            assert_eq!(endpoint, ApiEndpoint::Points);
            let stage = body["progress"].as_u64().unwrap_or(1);
            let mut response = serde_json::Map::new();
            match &body["id"] {
                Value::Array(ids) => {
                    for id in ids {
                        response.insert(id.as_str().unwrap().to_string(), points_for(stage));
                    }
                }
                Value::String(id) => {
                    response.insert(id.clone(), points_for(stage));
                }
                other => panic!("unexpected id {other}"),
            }
            Ok(Value::Object(response))
        });
        Arc::new(client.with_latency(latency))
    }

    fn context(client: Arc<MockApiClient>, max_in_flight: usize) -> Arc<LoaderContext> {
        let transport = Transport::new(client, RetryPolicy::None);
        let config = EngineConfig::default().with_max_concurrent_fetches(max_in_flight);
        Arc::new(LoaderContext::new(transport, &config, CancellationToken::new()))
    }

    fn stage_requests(client: &MockApiClient, id: &str, stage: u64) -> usize {
        client
            .bodies(ApiEndpoint::Points)
            .iter()
            .filter(|body| body["id"] == id && body["progress"] == stage)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_access_loads_stage_one() {
        let client = mock(Duration::ZERO);
        let ctx = context(client.clone(), 5);
        let controller = RouteLoadingController::new("c1", ctx);

        assert_eq!(controller.stage(), 0);
        let route = controller.route().await;

        assert_eq!(controller.stage(), 1);
        assert_eq!(route.read().len(), 3);
        assert!(controller.extras().is_some());

        controller.route().await;
        assert_eq!(client.call_count(ApiEndpoint::Points), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_is_noop_before_stage_one_and_when_complete() {
        let client = mock(Duration::ZERO);
        let ctx = context(client.clone(), 5);

        let fresh = Arc::new(RouteLoadingController::new("c1", ctx.clone()));
        fresh.load_track_progressive(LoadPriority::High).await;
        assert_eq!(fresh.stage(), 0);

        let inline = Arc::new(RouteLoadingController::with_route("c2", ctx, &[]));
        inline.load_track_progressive(LoadPriority::High).await;
        assert_eq!(inline.stage(), COMPLETE_STAGE);
        assert_eq!(client.call_count(ApiEndpoint::Points), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_send_one_request_and_chain_to_completion() {
        let client = mock(Duration::from_millis(20));
        let ctx = context(client.clone(), 5);
        let controller = Arc::new(RouteLoadingController::new("c1", ctx));
        controller.route().await;

        let first = controller.load_track_progressive(LoadPriority::Normal);
        let second = controller.load_track_progressive(LoadPriority::Normal);
        tokio::join!(first, second);

        assert!(controller.stage() >= 2);
        assert_eq!(stage_requests(&client, "c1", 2), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(controller.stage(), COMPLETE_STAGE);
        assert!(!controller.is_loading());
        assert_eq!(stage_requests(&client, "c1", 3), 1);
        assert_eq!(stage_requests(&client, "c1", 4), 1);

        let route = controller.route().await;
        let route = route.read();
        assert_eq!(route.len(), 12);
        assert!(route
            .points()
            .windows(2)
            .all(|pair| pair[0].arrival <= pair[1].arrival));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_queued_load_then_resume() {
        let client = mock(Duration::from_millis(100));
        let ctx = context(client.clone(), 1);
        let busy = Arc::new(RouteLoadingController::new("busy", ctx.clone()));
        let waiting = Arc::new(RouteLoadingController::new("waiting", ctx.clone()));
        tokio::join!(busy.route(), waiting.route());

        let _ = busy.load_track_progressive(LoadPriority::Normal);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ctx.queue().in_flight_count(), 1);

        let _ = waiting.load_track_progressive(LoadPriority::Normal);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(ctx.queue().is_queued("waiting"));

        waiting.cancel_load_track();
        assert!(!ctx.queue().is_queued("waiting"));
        assert!(!waiting.is_loading());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(waiting.stage(), 1);
        assert_eq!(stage_requests(&client, "waiting", 2), 0);

        waiting.load_track_progressive(LoadPriority::High).await;
        assert!(waiting.stage() >= 2);
        assert_eq!(stage_requests(&client, "waiting", 2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_load_applies_but_stops_chaining() {
        let client = mock(Duration::from_millis(100));
        let ctx = context(client.clone(), 5);
        let controller = Arc::new(RouteLoadingController::new("c1", ctx.clone()));
        controller.route().await;

        let done = controller.load_track_progressive(LoadPriority::Normal);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ctx.queue().in_flight_count(), 1);

        controller.cancel_load_track();
        done.await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(controller.stage(), 2);
        assert_eq!(stage_requests(&client, "c1", 3), 0);
        assert!(!controller.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_change_reorders_queued_load() {
        let client = mock(Duration::from_millis(100));
        let ctx = context(client.clone(), 1);
        let ids = ["busy", "a", "b"];
        let controllers: Vec<_> = ids
            .iter()
            .map(|id| Arc::new(RouteLoadingController::new(*id, ctx.clone())))
            .collect();
        for controller in &controllers {
            controller.route().await;
        }

        for controller in &controllers {
            let _ = controller.load_track_progressive(LoadPriority::Normal);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(ctx.queue().queued_ids(), vec!["a", "b"]);

        controllers[2].set_high_priority_loading(true);
        assert_eq!(ctx.queue().queued_ids(), vec!["b", "a"]);

        // Dispatched fetches are not affected.
        controllers[0].set_high_priority_loading(true);
        assert_eq!(ctx.queue().queued_ids(), vec!["b", "a"]);
    }
}

//! Deduplicating showplace lookup.
//!
//! Showplaces repeat across cruises, so they are loaded on demand and kept in
//! one dictionary. Each id is in one of two states:
//!
//! - [`LocationEntry::Pending`]: a fetch is in flight; every caller awaits the
//!   same shared future, which also performs the single cache write
//! - [`LocationEntry::Ready`]: the record is cached
//!
//! Ids the server does not return are dropped from the dictionary, so a later
//! lookup asks again.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::api::BoxFuture;
use crate::model::Location;

use super::coalescer::BatchCoalescer;

/// Cache state of one showplace id.
#[derive(Clone)]
pub enum LocationEntry {
    Pending(Shared<BoxFuture<'static, ()>>),
    Ready(Arc<Location>),
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, LocationEntry>,
    order: Vec<String>,
}

impl Entries {
    fn set_ready(&mut self, location: Arc<Location>) {
        let id = location.id.clone();
        if self
            .by_id
            .insert(id.clone(), LocationEntry::Ready(location))
            .is_none()
        {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &str) {
        if self.by_id.remove(id).is_some() {
            self.order.retain(|known| known != id);
        }
    }
}

/// Showplace dictionary with deduplicated batched loading.
pub struct LocationLookup {
    entries: Arc<Mutex<Entries>>,
    coalescer: BatchCoalescer<Option<Arc<Location>>>,
}

impl LocationLookup {
    pub fn new(coalescer: BatchCoalescer<Option<Arc<Location>>>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            coalescer,
        }
    }

    /// Stores an already-known showplace.
    pub fn insert(&self, location: Location) {
        self.entries.lock().set_ready(Arc::new(location));
    }

    /// The cached showplace, if resolved.
    pub fn get(&self, id: &str) -> Option<Arc<Location>> {
        match self.entries.lock().by_id.get(id) {
            Some(LocationEntry::Ready(location)) => Some(location.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        matches!(self.entries.lock().by_id.get(id), Some(LocationEntry::Pending(_)))
    }

    /// Every resolved showplace, in the order first seen.
    pub fn ready(&self) -> Vec<Arc<Location>> {
        let entries = self.entries.lock();
        entries
            .order
            .iter()
            .filter_map(|id| match entries.by_id.get(id) {
                Some(LocationEntry::Ready(location)) => Some(location.clone()),
                _ => None,
            })
            .collect()
    }

    /// Makes sure every id in `ids` is resolved or known to be missing.
    ///
    /// Unknown ids are requested through the coalescer; ids already pending
    /// join the existing fetch.
    pub fn ensure(&self, ids: &[String]) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut waits = Vec::new();
        let mut requested = 0usize;
        {
            let mut entries = self.entries.lock();
            for id in ids {
                match entries.by_id.get(id) {
                    Some(LocationEntry::Ready(_)) => {}
                    Some(LocationEntry::Pending(fetch)) => waits.push(fetch.clone()),
                    None => {
                        let fetch = self.fetch_one(id.clone());
                        entries
                            .by_id
                            .insert(id.clone(), LocationEntry::Pending(fetch.clone()));
                        entries.order.push(id.clone());
                        tokio::spawn(fetch.clone());
                        waits.push(fetch);
                        requested += 1;
                    }
                }
            }
        }

        if requested > 0 {
            debug!(requested, waiting = waits.len(), "Looking up showplaces");
        }

        async move {
            join_all(waits).await;
        }
    }

    fn fetch_one(&self, id: String) -> Shared<BoxFuture<'static, ()>> {
        let request = self.coalescer.request(id.clone());
        let entries = self.entries.clone();
        async move {
            let location = request.await;
            let mut entries = entries.lock();
            match location {
                Some(location) => entries.set_ready(location),
                None => {
                    debug!(id = %id, "Showplace not returned by server");
                    entries.remove(&id);
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::coalescer::{BatchSource, CoalescerConfig};
    use crate::model::LocationKind;
    use std::time::Duration;

    struct Showplaces {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl BatchSource<Option<Arc<Location>>> for Showplaces {
        fn fetch(&self, keys: Vec<String>) -> BoxFuture<'static, HashMap<String, Option<Arc<Location>>>> {
            self.batches.lock().push(keys.clone());
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                keys.into_iter()
                    .filter(|k| k != "gone")
                    .map(|k| {
                        let location = showplace(&k);
                        (k, Some(Arc::new(location)))
                    })
                    .collect()
            })
        }
    }

    fn showplace(id: &str) -> Location {
        Location {
            id: id.to_string(),
            kind: LocationKind::Showplace,
            lat: 0.0,
            lng: 0.0,
            name: format!("Sight {}", id),
            category: None,
            image: None,
            link: None,
        }
    }

    fn lookup() -> (LocationLookup, Arc<Showplaces>) {
        let source = Arc::new(Showplaces {
            batches: Mutex::new(Vec::new()),
        });
        let coalescer = BatchCoalescer::new("showplaces", source.clone(), CoalescerConfig::default());
        (LocationLookup::new(coalescer), source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_share_one_fetch() {
        let (lookup, source) = lookup();
        let ids = vec!["1".to_string(), "2".to_string()];

        let first = lookup.ensure(&ids);
        assert!(lookup.is_pending("1"));
        let second = lookup.ensure(&["2".to_string(), "3".to_string()]);

        tokio::join!(first, second);

        assert_eq!(source.batches.lock().len(), 1);
        assert_eq!(source.batches.lock()[0], vec!["1", "2", "3"]);
        assert_eq!(lookup.get("2").unwrap().name, "Sight 2");
        assert_eq!(lookup.ready().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_ids_are_not_refetched() {
        let (lookup, source) = lookup();
        lookup.insert(showplace("known"));

        lookup.ensure(&["known".to_string()]).await;
        assert!(source.batches.lock().is_empty());

        lookup.ensure(&["a".to_string()]).await;
        lookup.ensure(&["a".to_string()]).await;
        assert_eq!(source.batches.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ids_are_dropped() {
        let (lookup, _source) = lookup();

        lookup.ensure(&["gone".to_string(), "here".to_string()]).await;

        assert!(lookup.get("gone").is_none());
        assert!(!lookup.is_pending("gone"));
        let ids: Vec<String> = lookup.ready().iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, vec!["here"]);
    }
}

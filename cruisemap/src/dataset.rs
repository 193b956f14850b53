//! Once-resolved values that consumers can await.
//!
//! The engine loads its data in stages (cruises, then stops, then gateways).
//! Each stage is published through a [`Dataset`]: the first `resolve` wins,
//! and every `wait` completes as soon as a value is present.
//!
//! # Example
//!
//! ```ignore
//! use cruisemap::Dataset;
//!
//! let dataset = Dataset::new();
//! assert!(dataset.get().is_none());
//!
//! dataset.resolve(7u32);
//! dataset.resolve(8u32); // ignored
//! assert_eq!(dataset.wait().await, 7);
//! ```

use std::fmt;

use tokio::sync::watch;

/// A value that is published once and awaited many times.
pub struct Dataset<T> {
    value: watch::Sender<Option<T>>,
}

impl<T: Clone> Dataset<T> {
    pub fn new() -> Self {
        let (value, _) = watch::channel(None);
        Self { value }
    }

    /// Publishes `value`. Returns false if the dataset was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let mut value = Some(value);
        self.value.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = value.take();
            true
        })
    }

    /// The value, if resolved.
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Waits for the value.
    pub async fn wait(&self) -> T {
        let mut receiver = self.value.subscribe();
        if let Ok(value) = receiver.wait_for(Option::is_some).await {
            if let Some(value) = value.as_ref() {
                return value.clone();
            }
        }
        // The sender lives as long as `self`, so the channel cannot close here.
        std::future::pending().await
    }
}

impl<T: Clone> Default for Dataset<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("resolved", &self.value.borrow().is_some())
            .finish()
    }
}

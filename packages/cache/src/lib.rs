#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region-keyed cache of loaded collections.
//!
//! The first successful load for a key is stored and every later lookup
//! is served from memory. Entries are immutable once stored and live as
//! long as the cache. There is no eviction: the key space is the handful
//! of regions in the region table.
//!
//! The map lock is held only for the check and for the insert, never
//! across the loader's `.await`. Two callers missing the same key at the
//! same time may both run their loader; the later insert wins and both
//! callers get a complete collection.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared region → value store.
#[derive(Debug)]
pub struct RegionCache<V> {
    entries: Mutex<BTreeMap<String, Arc<V>>>,
}

impl<V> Default for RegionCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<V> RegionCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<V>>> {
        // Entries are only ever inserted whole, so a poisoned map is still
        // consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the stored value for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.lock().get(key).cloned()
    }

    /// Returns `true` if `key` has a stored value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stored keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&self, key: &str, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.lock().insert(key.to_string(), Arc::clone(&value));
        value
    }

    /// Returns the stored value for `key`, or runs `loader`, stores its
    /// result, and returns it.
    ///
    /// # Errors
    ///
    /// Returns the loader's error unchanged. Nothing is stored in that
    /// case, so the next call for the key loads again.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, loader: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key) {
            log::debug!("Cache hit for {key}");
            return Ok(hit);
        }

        log::debug!("Cache miss for {key}, loading");
        let value = loader().await?;
        let stored = self.insert(key, value);
        log::info!("Cached {key} ({} entries)", self.len());
        Ok(stored)
    }
}

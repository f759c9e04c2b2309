//! Time-expiring memo of fetch results keyed by dataset identifier.
//!
//! A panel asks [`FetchCache::get`] each frame whether its table is still
//! fresh and goes through [`FetchCache::get_or_fetch`] only once the entry has
//! expired, so at most one request per identifier is made inside the TTL window.
//! Entries are shared as `Arc` snapshots and never mutated, so concurrent
//! sessions reading the same identifier see the same table. Failures are not
//! cached.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::fetch::{FetchError, FetchedTable, Fetcher};

struct Entry {
    stored_at: Instant,
    value: Arc<FetchedTable>,
}

pub struct FetchCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        FetchCache {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh entry for `identifier`, if any.
    pub fn get(&self, identifier: &str) -> Option<Arc<FetchedTable>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries
            .get(identifier)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    pub fn get_or_fetch(
        &self,
        fetcher: &Fetcher,
        identifier: &str,
    ) -> Result<Arc<FetchedTable>, FetchError> {
        if let Some(hit) = self.get(identifier) {
            return Ok(hit);
        }

        let value = Arc::new(fetcher.fetch(identifier)?);
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if entries.contains_key(identifier) {
            log::debug!("Replacing expired cache entry for {identifier}");
        }
        entries.insert(
            identifier.to_string(),
            Entry {
                stored_at: Instant::now(),
                value: Arc::clone(&value),
            },
        );
        Ok(value)
    }

    /// Drop the entry so the next lookup refetches.
    pub fn invalidate(&self, identifier: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(identifier);
    }
}

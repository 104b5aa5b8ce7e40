//! Per-invocation cache for provider lookups.
//!
//! Provider state can change between runs, so results are only kept in
//! memory for the lifetime of one client. Both positive and negative
//! results are cached; unknown results are not.

use super::{LookupKind, LookupStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Default)]
pub struct LookupCache {
    entries: RwLock<HashMap<String, LookupStatus>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a cache key for a kind/id pair.
    fn cache_key(kind: LookupKind, id: &str) -> String {
        format!("{}:{}", kind.as_str(), id)
    }

    pub fn get(&self, kind: LookupKind, id: &str) -> Option<LookupStatus> {
        let key = Self::cache_key(kind, id);
        let cached = self.entries.read().ok()?.get(&key).cloned();
        match cached {
            Some(status) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(status)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, kind: LookupKind, id: &str, status: &LookupStatus) {
        if matches!(status, LookupStatus::Unknown(_)) {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(Self::cache_key(kind, id), status.clone());
        }
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

//! Recency-bounded cache.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use indexmap::IndexMap;
use loadq_core::{DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_DECODABLE_DIMENSION, Scale};
use tracing::debug;
use url::Url;

use super::{Cache, ScaleBook};

/// Entries ordered from least to most recently used.
#[derive(Debug, Default)]
struct Recency {
    bytes: IndexMap<Url, Bytes>,
    size: u64,
    max_size: u64,
}

impl Recency {
    fn touch(&mut self, key: &Url) -> Option<Bytes> {
        let index = self.bytes.get_index_of(key)?;
        let last = self.bytes.len() - 1;
        self.bytes.move_index(index, last);
        self.bytes.get_index(last).map(|(_, bytes)| bytes.clone())
    }

    fn trim(&mut self) {
        while self.size > self.max_size {
            let Some((key, evicted)) = self.bytes.shift_remove_index(0) else {
                break;
            };
            self.size -= evicted.len() as u64;
            debug!(%key, bytes = evicted.len(), "Evicted least recently used entry");
        }
    }
}

/// A cache that evicts least recently used entries to stay within budget.
///
/// A single entry larger than the whole budget is rejected. Shrinking the
/// budget trims immediately.
#[derive(Debug)]
pub struct LruCache {
    entries: Mutex<Recency>,
    scales: ScaleBook,
    ceiling: Scale,
}

impl Default for LruCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_SIZE)
    }
}

impl LruCache {
    pub fn new(max_size: u64) -> Self {
        Self {
            entries: Mutex::new(Recency {
                max_size,
                ..Recency::default()
            }),
            scales: ScaleBook::default(),
            ceiling: Scale::square(DEFAULT_MAX_DECODABLE_DIMENSION),
        }
    }

    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: Scale) -> Self {
        self.ceiling = ceiling;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Recency> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for LruCache {
    fn put(&self, key: &Url, bytes: Bytes) -> bool {
        let mut entries = self.lock();
        let added = bytes.len() as u64;
        if added > entries.max_size {
            debug!(%key, bytes = added, max = entries.max_size, "Entry larger than cache; rejecting put");
            return false;
        }
        if let Some(old) = entries.bytes.shift_remove(key) {
            entries.size -= old.len() as u64;
        }
        entries.bytes.insert(key.clone(), bytes);
        entries.size += added;
        entries.trim();
        true
    }

    fn get(&self, key: &Url) -> Option<Bytes> {
        self.lock().touch(key)
    }

    fn remove(&self, key: &Url) -> Option<Bytes> {
        let mut entries = self.lock();
        let removed = entries.bytes.shift_remove(key)?;
        entries.size -= removed.len() as u64;
        Some(removed)
    }

    fn is_cached(&self, key: &Url) -> bool {
        self.lock().bytes.contains_key(key)
    }

    fn size(&self) -> u64 {
        self.lock().size
    }

    fn count(&self) -> usize {
        self.lock().bytes.len()
    }

    fn max_size(&self) -> u64 {
        self.lock().max_size
    }

    fn set_max_size(&self, max_size: u64) {
        let mut entries = self.lock();
        entries.max_size = max_size;
        entries.trim();
    }

    fn set_scale(&self, key: &Url, scale: Scale) {
        self.scales.set(key, scale);
    }

    fn scale(&self, key: &Url) -> Option<Scale> {
        self.scales.get(key)
    }

    fn remove_scale(&self, key: &Url) -> Option<Scale> {
        self.scales.remove(key)
    }

    fn scales_count(&self) -> usize {
        self.scales.len()
    }

    fn max_decodable_scale(&self) -> Scale {
        self.ceiling
    }

    fn clear(&self) {
        let mut entries = self.lock();
        entries.bytes.clear();
        entries.size = 0;
        drop(entries);
        self.scales.clear();
    }
}

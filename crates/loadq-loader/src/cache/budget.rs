//! Budget-bounded cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use loadq_core::{DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_DECODABLE_DIMENSION, Scale};
use tracing::debug;
use url::Url;

use super::{Cache, ScaleBook};

#[derive(Debug, Default)]
struct Entries {
    bytes: HashMap<Url, Bytes>,
    size: u64,
    max_size: u64,
}

/// A cache that stops accepting entries once its budget is exceeded.
///
/// The check runs against the aggregate size *before* the put: a put is
/// rejected only when the cache is already over budget, so the last accepted
/// entry may overshoot it.
#[derive(Debug)]
pub struct BudgetCache {
    entries: Mutex<Entries>,
    scales: ScaleBook,
    ceiling: Scale,
}

impl Default for BudgetCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_SIZE)
    }
}

impl BudgetCache {
    pub fn new(max_size: u64) -> Self {
        Self {
            entries: Mutex::new(Entries {
                max_size,
                ..Entries::default()
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

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for BudgetCache {
    fn put(&self, key: &Url, bytes: Bytes) -> bool {
        let mut entries = self.lock();
        if entries.size > entries.max_size {
            debug!(%key, size = entries.size, max = entries.max_size, "Cache over budget; rejecting put");
            return false;
        }
        let added = bytes.len() as u64;
        if let Some(old) = entries.bytes.insert(key.clone(), bytes) {
            entries.size -= old.len() as u64;
        }
        entries.size += added;
        true
    }

    fn get(&self, key: &Url) -> Option<Bytes> {
        self.lock().bytes.get(key).cloned()
    }

    fn remove(&self, key: &Url) -> Option<Bytes> {
        let mut entries = self.lock();
        let removed = entries.bytes.remove(key)?;
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
        self.lock().max_size = max_size;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::url;

    fn bytes(n: usize) -> Bytes {
        Bytes::from(vec![0u8; n])
    }

    #[test]
    fn test_rejects_once_over_budget() {
        let cache = BudgetCache::new(100);
        assert!(cache.put(&url("a"), bytes(60)));
        assert!(cache.put(&url("b"), bytes(60)));
        assert!(!cache.put(&url("c"), bytes(60)));

        assert_eq!(cache.size(), 120);
        assert_eq!(cache.count(), 2);
        assert!(!cache.is_cached(&url("c")));
    }

    #[test]
    fn test_replacing_entry_adjusts_size() {
        let cache = BudgetCache::default();
        cache.put(&url("a"), bytes(10));
        cache.put(&url("a"), bytes(4));
        assert_eq!(cache.size(), 4);
        assert_eq!(cache.count(), 1);

        assert_eq!(cache.remove(&url("a")).map(|b| b.len()), Some(4));
        assert_eq!(cache.size(), 0);
        assert!(cache.remove(&url("a")).is_none());
    }

    #[test]
    fn test_scales_have_independent_lifecycle() {
        let cache = BudgetCache::default();
        let key = url("a");
        cache.set_scale(&key, Scale::new(10, 20));
        assert!(cache.has_scale(&key));
        assert!(!cache.is_cached(&key));

        cache.put(&key, bytes(3));
        cache.remove(&key);
        assert_eq!(cache.scale(&key), Some(Scale::new(10, 20)));
        assert_eq!(cache.scales_count(), 1);

        assert_eq!(cache.remove_scale(&key), Some(Scale::new(10, 20)));
        assert_eq!(cache.scales_count(), 0);
    }

    #[test]
    fn test_clear_wipes_both_maps() {
        let cache = BudgetCache::default();
        cache.put(&url("a"), bytes(3));
        cache.set_scale(&url("b"), Scale::square(5));
        cache.clear();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.scales_count(), 0);
    }

    #[test]
    fn test_max_size_is_adjustable() {
        let cache = BudgetCache::new(5);
        assert_eq!(cache.max_size(), 5);
        cache.put(&url("a"), bytes(6));
        assert!(!cache.put(&url("b"), bytes(1)));
        cache.set_max_size(10);
        assert!(cache.put(&url("b"), bytes(1)));
    }
}

//! Byte caches keyed by locator.
//!
//! Every cache keeps two independent maps over the same key space:
//!
//! - bytes by locator, bounded by a byte budget (sum of stored lengths)
//! - scale by locator, unbounded, with its own lifecycle (a scale may exist
//!   before the bytes are fetched and survives their eviction)
//!
//! Three flavours are provided: [`BudgetCache`] rejects puts once the budget
//! is exceeded, [`LruCache`] evicts least recently used entries, and
//! [`NullCache`] stores nothing.

mod budget;
mod lru;
mod null;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use loadq_core::{CacheKind, ImageLoaderConfig, Scale};
use tracing::trace;
use url::Url;

pub use budget::BudgetCache;
pub use lru::LruCache;
pub use null::NullCache;

/// Locator-keyed byte store with scale bookkeeping.
///
/// All operations are safe under concurrent access. No operation spans the
/// two maps atomically.
pub trait Cache: Send + Sync {
    /// Store `bytes` under `key`. Returns `false` if the budget rejects it.
    fn put(&self, key: &Url, bytes: Bytes) -> bool;

    fn get(&self, key: &Url) -> Option<Bytes>;

    fn remove(&self, key: &Url) -> Option<Bytes>;

    fn is_cached(&self, key: &Url) -> bool;

    /// Aggregate stored bytes.
    fn size(&self) -> u64;

    /// Number of stored entries.
    fn count(&self) -> usize;

    fn max_size(&self) -> u64;

    fn set_max_size(&self, max_size: u64);

    /// Remember the largest scale requested for `key`.
    fn set_scale(&self, key: &Url, scale: Scale);

    fn scale(&self, key: &Url) -> Option<Scale>;

    fn has_scale(&self, key: &Url) -> bool {
        self.scale(key).is_some()
    }

    fn remove_scale(&self, key: &Url) -> Option<Scale>;

    fn scales_count(&self) -> usize;

    /// Box applied to payloads too large to decode at full size.
    fn max_decodable_scale(&self) -> Scale;

    /// The scale a freshly fetched payload should be brought to.
    ///
    /// The remembered scale wins; otherwise the decodable ceiling applies
    /// when the payload's `dimensions` exceed it; otherwise none.
    fn resolve_scale(&self, key: &Url, dimensions: Option<(u32, u32)>) -> Option<Scale> {
        if let Some(scale) = self.scale(key) {
            return Some(scale);
        }
        let ceiling = self.max_decodable_scale();
        match dimensions {
            Some((width, height)) if !ceiling.contains(width, height) => {
                trace!(%key, width, height, %ceiling, "Payload exceeds decodable ceiling");
                Some(ceiling)
            }
            _ => None,
        }
    }

    /// Wipe bytes and scales.
    fn clear(&self);
}

/// Build the cache selected by `config`.
pub fn from_config(config: &ImageLoaderConfig) -> Arc<dyn Cache> {
    let ceiling = config.max_decodable_scale();
    match config.cache {
        CacheKind::Budget => Arc::new(BudgetCache::new(config.max_cache_size).with_ceiling(ceiling)),
        CacheKind::Lru => Arc::new(LruCache::new(config.max_cache_size).with_ceiling(ceiling)),
        CacheKind::None => Arc::new(NullCache::new().with_ceiling(ceiling)),
    }
}

/// Scale-by-locator map shared by the storing caches.
#[derive(Debug, Default)]
pub(crate) struct ScaleBook {
    scales: Mutex<HashMap<Url, Scale>>,
}

impl ScaleBook {
    fn lock(&self) -> MutexGuard<'_, HashMap<Url, Scale>> {
        self.scales.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, key: &Url, scale: Scale) {
        self.lock().insert(key.clone(), scale);
    }

    pub(crate) fn get(&self, key: &Url) -> Option<Scale> {
        self.lock().get(key).copied()
    }

    pub(crate) fn remove(&self, key: &Url) -> Option<Scale> {
        self.lock().remove(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

//! A cache that stores nothing.

use bytes::Bytes;
use loadq_core::{DEFAULT_MAX_DECODABLE_DIMENSION, Scale};
use url::Url;

use super::Cache;

/// Always misses and never stores. Scale resolution still applies the
/// decodable ceiling.
#[derive(Debug, Clone, Copy)]
pub struct NullCache {
    ceiling: Scale,
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NullCache {
    pub const fn new() -> Self {
        Self {
            ceiling: Scale::square(DEFAULT_MAX_DECODABLE_DIMENSION),
        }
    }

    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: Scale) -> Self {
        self.ceiling = ceiling;
        self
    }
}

impl Cache for NullCache {
    fn put(&self, _key: &Url, _bytes: Bytes) -> bool {
        false
    }

    fn get(&self, _key: &Url) -> Option<Bytes> {
        None
    }

    fn remove(&self, _key: &Url) -> Option<Bytes> {
        None
    }

    fn is_cached(&self, _key: &Url) -> bool {
        false
    }

    fn size(&self) -> u64 {
        0
    }

    fn count(&self) -> usize {
        0
    }

    fn max_size(&self) -> u64 {
        0
    }

    fn set_max_size(&self, _max_size: u64) {}

    fn set_scale(&self, _key: &Url, _scale: Scale) {}

    fn scale(&self, _key: &Url) -> Option<Scale> {
        None
    }

    fn remove_scale(&self, _key: &Url) -> Option<Scale> {
        None
    }

    fn scales_count(&self) -> usize {
        0
    }

    fn max_decodable_scale(&self) -> Scale {
        self.ceiling
    }

    fn clear(&self) {}
}

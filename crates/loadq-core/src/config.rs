//! Loader configuration types.
//!
//! Plain structs with defaults and builder methods. Every field has a serde
//! default so partial JSON files work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Scale;

/// Default chunk size for stream copies.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Minimum time between two progress events of one transfer.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// Default byte budget of image caches.
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 5_000_000;

/// Largest dimension decoded without a scale request.
pub const DEFAULT_MAX_DECODABLE_DIMENSION: u32 = 2048;

/// Area difference (square pixels) below which two scales count as equal.
pub const DEFAULT_SCALE_TOLERANCE: u64 = 100;

/// Configuration for one loader engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Bytes read or written per chunk.
    pub chunk_size: usize,
    /// Throttle interval for progress events, in milliseconds.
    pub progress_interval_ms: u64,
    /// Run listener callbacks inline on the worker thread.
    pub full_async: bool,
    /// Name given to worker threads.
    pub thread_name: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            full_async: false,
            thread_name: "loadq-worker".to_string(),
        }
    }
}

impl LoaderConfig {
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval_ms = saturating_millis(interval);
        self
    }

    #[must_use]
    pub const fn with_full_async(mut self, full_async: bool) -> Self {
        self.full_async = full_async;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Chunk size, never zero.
    pub const fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

/// Which cache implementation an image loader uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Rejects puts once the budget is exceeded.
    #[default]
    Budget,
    /// Evicts least recently used entries.
    Lru,
    /// Stores nothing.
    None,
}

/// Configuration for the dual-queue image loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLoaderConfig {
    /// Settings shared by the fetch and cache engines.
    pub loader: LoaderConfig,
    pub cache: CacheKind,
    /// Byte budget of the cache.
    pub max_cache_size: u64,
    /// Payloads wider or taller than this are scaled down.
    pub max_decodable_dimension: u32,
    /// See [`DEFAULT_SCALE_TOLERANCE`].
    pub scale_tolerance: u64,
}

impl Default for ImageLoaderConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default().with_thread_name("loadq-image"),
            cache: CacheKind::default(),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            max_decodable_dimension: DEFAULT_MAX_DECODABLE_DIMENSION,
            scale_tolerance: DEFAULT_SCALE_TOLERANCE,
        }
    }
}

impl ImageLoaderConfig {
    #[must_use]
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub const fn with_cache(mut self, cache: CacheKind) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub const fn with_max_cache_size(mut self, max: u64) -> Self {
        self.max_cache_size = max;
        self
    }

    #[must_use]
    pub const fn with_max_decodable_dimension(mut self, dimension: u32) -> Self {
        self.max_decodable_dimension = dimension;
        self
    }

    #[must_use]
    pub const fn with_scale_tolerance(mut self, tolerance: u64) -> Self {
        self.scale_tolerance = tolerance;
        self
    }

    /// The ceiling box applied to oversized payloads.
    pub const fn max_decodable_scale(&self) -> Scale {
        Scale::square(self.max_decodable_dimension)
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15_000,
            read_timeout_ms: 10_000,
            user_agent: concat!("loadq/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpTransportConfig {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = saturating_millis(timeout);
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = saturating_millis(timeout);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

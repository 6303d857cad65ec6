//! Queue-draining loader engine for loadq.
//!
//! # Modules
//!
//! - `queue` - ordered request queues with identity or locator dedup
//! - `engine` - one worker thread per queue, cooperative flags, dispatch
//! - `delivery` - where listener callbacks run
//! - `strategy` - pluggable fetch behaviour (raw, multipart upload, images)
//! - `cache` - byte caches with scale bookkeeping
//! - `image_loader` - the dual-queue image loader
//! - `http` - reqwest-backed transport
//! - `codec` - `image`-crate backed codec

// Re-export core types for convenience
pub use loadq_core::{
    BOUNDARY, CacheKind, Connection, DeliveryContext, HttpTransportConfig, ImageCodec,
    ImageLoaderConfig, InlineDelivery, LoadError, LoadEvent, LoadListener, LoadResult,
    LoaderConfig, MULTIPART_CONTENT_TYPE, MULTIPART_PREAMBLE, Method, NoopListener, Part,
    PartImageFormat, Request, Scale, Transport, TransportRequest, UploadBody,
};

pub mod cache;
pub mod codec;
pub mod delivery;
pub mod engine;
pub mod http;
pub mod image_loader;
pub(crate) mod progress;
pub mod queue;
pub mod strategy;

pub use cache::{BudgetCache, Cache, LruCache, NullCache};
pub use codec::ImageCrateCodec;
pub use delivery::{MainLoop, MainLoopHandle, ThreadDelivery};
pub use engine::{FetchContext, ListenerSet, Loader, LoaderBuilder, LoaderState};
pub use http::HttpTransport;
pub use image_loader::{ImageLoader, ImageLoaderBuilder, Route};
pub use queue::{ByIdentity, ByLocator, DefaultQueue, DedupPolicy, LocatorQueue, Queue, RequestQueue};
pub use strategy::{
    FetchStrategy, Fetched, ImageCacheStrategy, ImageFetchStrategy, RawStrategy, UploadStrategy,
};

// Re-export the decoded image type delivered by the image loader
pub use image::DynamicImage;

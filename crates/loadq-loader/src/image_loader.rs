//! Dual-queue image loader.
//!
//! Two engines run side by side: a fetch engine whose worker goes to the
//! network, and a cache engine whose worker serves cache hits. Requests are
//! routed by cache residency at enqueue time. Both queues deduplicate by
//! locator and both engines report to one listener set.
//!
//! Routing and cache mutation are not atomic with each other. An entry may
//! be evicted after a request was routed to the cache queue; the cache
//! worker then fetches it from the network.

use std::sync::Arc;

use image::DynamicImage;
use loadq_core::{
    DeliveryContext, ImageCodec, ImageLoaderConfig, LoadListener, LoadResult, LoaderConfig,
    Request, Scale, Transport,
};
use tracing::debug;

use crate::cache::{self, Cache};
use crate::codec::ImageCrateCodec;
use crate::delivery::ThreadDelivery;
use crate::engine::{ListenerSet, Loader};
use crate::queue::LocatorQueue;
use crate::strategy::{ImageCacheStrategy, ImageFetchStrategy};

/// Which queue a request went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not cached: the network worker handles it.
    Fetch,
    /// Cached: the cache worker handles it.
    Cache,
}

/// Builder for [`ImageLoader`].
pub struct ImageLoaderBuilder {
    transport: Arc<dyn Transport>,
    config: ImageLoaderConfig,
    cache: Option<Arc<dyn Cache>>,
    codec: Option<Arc<dyn ImageCodec>>,
    delivery: Option<Arc<dyn DeliveryContext>>,
}

impl ImageLoaderBuilder {
    #[must_use]
    pub fn config(mut self, config: ImageLoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this cache instead of the one selected by the configuration.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Delivery context shared by both engines.
    #[must_use]
    pub fn delivery(mut self, delivery: Arc<dyn DeliveryContext>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn build(self) -> LoadResult<ImageLoader> {
        let cache = self
            .cache
            .unwrap_or_else(|| cache::from_config(&self.config));
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(ImageCrateCodec::new()));
        let base = &self.config.loader;
        let delivery = match self.delivery {
            Some(delivery) => delivery,
            None => Arc::new(ThreadDelivery::spawn(format!("{}-delivery", base.thread_name))?),
        };

        let listeners = Arc::new(ListenerSet::new());
        let fetch_queue = Arc::new(LocatorQueue::new());
        let cache_queue = Arc::new(LocatorQueue::new());
        let fetch_strategy =
            ImageFetchStrategy::new(self.transport, Arc::clone(&cache), Arc::clone(&codec));

        let fetch = Loader::builder(fetch_strategy.clone())
            .queue(Arc::clone(&fetch_queue) as _)
            .config(engine_config(base, "fetch"))
            .delivery(Arc::clone(&delivery))
            .listeners(Arc::clone(&listeners))
            .build()?;
        let cached = Loader::builder(ImageCacheStrategy::new(fetch_strategy))
            .queue(Arc::clone(&cache_queue) as _)
            .config(engine_config(base, "cache"))
            .delivery(delivery)
            .listeners(Arc::clone(&listeners))
            .build()?;

        Ok(ImageLoader {
            fetch,
            cached,
            fetch_queue,
            cache_queue,
            cache,
            listeners,
            scale_tolerance: self.config.scale_tolerance,
        })
    }
}

fn engine_config(base: &LoaderConfig, role: &str) -> LoaderConfig {
    base.clone()
        .with_thread_name(format!("{}-{role}", base.thread_name))
}

/// Loads images through a fetch worker and a cache worker.
///
/// Nothing starts automatically: call [`ImageLoader::start`] after
/// enqueueing.
pub struct ImageLoader {
    fetch: Loader<ImageFetchStrategy>,
    cached: Loader<ImageCacheStrategy>,
    fetch_queue: Arc<LocatorQueue>,
    cache_queue: Arc<LocatorQueue>,
    cache: Arc<dyn Cache>,
    listeners: Arc<ListenerSet<DynamicImage>>,
    scale_tolerance: u64,
}

impl ImageLoader {
    pub fn builder(transport: Arc<dyn Transport>) -> ImageLoaderBuilder {
        ImageLoaderBuilder {
            transport,
            config: ImageLoaderConfig::default(),
            cache: None,
            codec: None,
            delivery: None,
        }
    }

    pub fn new(transport: Arc<dyn Transport>, config: ImageLoaderConfig) -> LoadResult<Self> {
        Self::builder(transport).config(config).build()
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn fetch_queue(&self) -> &Arc<LocatorQueue> {
        &self.fetch_queue
    }

    pub fn cache_queue(&self) -> &Arc<LocatorQueue> {
        &self.cache_queue
    }

    pub fn fetch_loader(&self) -> &Loader<ImageFetchStrategy> {
        &self.fetch
    }

    pub fn cache_loader(&self) -> &Loader<ImageCacheStrategy> {
        &self.cached
    }

    /// Listeners receive events from both engines.
    pub fn add_listener(&self, listener: Arc<dyn LoadListener<DynamicImage>>) -> bool {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn LoadListener<DynamicImage>>) -> bool {
        self.listeners.remove(listener)
    }

    /// Route `request` by cache residency.
    ///
    /// A duplicate locator already pending in the chosen queue is ignored.
    pub fn add_to_queue(&self, request: Arc<Request>) -> Route {
        let route = if self.cache.is_cached(request.locator()) {
            Route::Cache
        } else {
            Route::Fetch
        };
        let accepted = match route {
            Route::Cache => self.cache_queue.add(request),
            Route::Fetch => self.fetch_queue.add(request),
        };
        if !accepted {
            debug!(?route, "Locator already queued");
        }
        route
    }

    /// Route `request`, first making sure it will be served at least at
    /// `scale`.
    ///
    /// When `scale` covers more than the tolerance beyond the largest scale
    /// remembered for the locator (or none is remembered), the cached bytes
    /// are evicted and `scale` is remembered.
    pub fn add_to_queue_scaled(&self, request: Arc<Request>, scale: Scale) -> Route {
        let locator = request.locator();
        let previous = self.cache.scale(locator);
        if scale.is_significantly_larger(previous, self.scale_tolerance) {
            if self.cache.remove(locator).is_some() {
                debug!(%locator, %scale, "Evicted cached image for larger scale");
            }
            self.cache.set_scale(locator, scale);
        }
        self.add_to_queue(request)
    }

    pub fn start(&self) -> LoadResult<()> {
        self.fetch.start()?;
        self.cached.start()
    }

    pub fn allow_work(&self) {
        self.fetch.allow_work();
        self.cached.allow_work();
    }

    pub fn stop_work(&self) {
        self.fetch.stop_work();
        self.cached.stop_work();
    }

    pub fn cancel_current(&self) {
        self.fetch.cancel_current();
        self.cached.cancel_current();
    }

    pub fn set_full_async(&self, full_async: bool) {
        self.fetch.set_full_async(full_async);
        self.cached.set_full_async(full_async);
    }

    /// Block until both workers exit.
    pub fn join(&self) {
        self.fetch.join();
        self.cached.join();
    }

    /// Stop both workers and clear both queues and the cache.
    pub fn reset(&self) {
        self.fetch.reset();
        self.cached.reset();
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BudgetCache;
    use bytes::Bytes;
    use loadq_core::{Connection, InlineDelivery, LoadError, TransportRequest};

    struct Unreachable;

    impl Transport for Unreachable {
        fn open(&self, request: TransportRequest) -> LoadResult<Connection> {
            Err(LoadError::transport(format!("no network for {}", request.locator)))
        }
    }

    fn loader(cache: Arc<dyn Cache>) -> ImageLoader {
        ImageLoader::builder(Arc::new(Unreachable))
            .cache(cache)
            .delivery(Arc::new(InlineDelivery))
            .build()
            .unwrap()
    }

    fn req(path: &str) -> Arc<Request> {
        Arc::new(Request::parse(&format!("http://img.test/{path}")).unwrap())
    }

    #[test]
    fn test_routes_by_residency() {
        let cache: Arc<dyn Cache> = Arc::new(BudgetCache::default());
        let loader = loader(Arc::clone(&cache));
        let hit = req("hit.png");
        cache.put(hit.locator(), Bytes::from_static(b"x"));

        assert_eq!(loader.add_to_queue(hit), Route::Cache);
        assert_eq!(loader.add_to_queue(req("miss.png")), Route::Fetch);
        assert_eq!(loader.cache_queue().len(), 1);
        assert_eq!(loader.fetch_queue().len(), 1);

        // Locator dedup
        loader.add_to_queue(req("miss.png"));
        assert_eq!(loader.fetch_queue().len(), 1);
    }

    #[test]
    fn test_larger_scale_evicts_and_refetches() {
        let cache: Arc<dyn Cache> = Arc::new(BudgetCache::default());
        let loader = loader(Arc::clone(&cache));
        let request = req("a.png");
        let locator = request.locator().clone();

        assert_eq!(
            loader.add_to_queue_scaled(Arc::clone(&request), Scale::new(100, 100)),
            Route::Fetch
        );
        loader.fetch_queue().clear();
        cache.put(&locator, Bytes::from_static(b"small"));

        // Within tolerance: untouched, served from cache
        assert_eq!(
            loader.add_to_queue_scaled(Arc::clone(&request), Scale::new(100, 101)),
            Route::Cache
        );
        assert!(cache.is_cached(&locator));
        assert_eq!(cache.scale(&locator), Some(Scale::new(100, 100)));
        loader.cache_queue().clear();

        // Significantly larger: evicted, refetched, remembered
        assert_eq!(
            loader.add_to_queue_scaled(request, Scale::new(200, 200)),
            Route::Fetch
        );
        assert!(!cache.is_cached(&locator));
        assert_eq!(cache.scale(&locator), Some(Scale::new(200, 200)));
    }

    #[test]
    fn test_smaller_scale_keeps_remembered_maximum() {
        let cache: Arc<dyn Cache> = Arc::new(BudgetCache::default());
        let loader = loader(Arc::clone(&cache));
        let request = req("a.png");
        loader.add_to_queue_scaled(Arc::clone(&request), Scale::new(300, 300));
        loader.add_to_queue_scaled(Arc::clone(&request), Scale::new(10, 10));
        assert_eq!(cache.scale(request.locator()), Some(Scale::new(300, 300)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache: Arc<dyn Cache> = Arc::new(BudgetCache::default());
        let loader = loader(Arc::clone(&cache));
        let hit = req("hit.png");
        cache.put(hit.locator(), Bytes::from_static(b"x"));
        cache.set_scale(hit.locator(), Scale::square(4));
        loader.add_to_queue(hit);
        loader.add_to_queue(req("miss.png"));

        loader.reset();
        assert!(loader.cache_queue().is_empty());
        assert!(loader.fetch_queue().is_empty());
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.scales_count(), 0);
    }
}

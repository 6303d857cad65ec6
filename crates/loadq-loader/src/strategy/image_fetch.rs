//! Image strategies: the network path and the cache-hit path.

use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use loadq_core::{ImageCodec, LoadResult, Transport};
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::engine::FetchContext;

use super::{FetchStrategy, Fetched};

/// Downloads an image, brings it to its effective scale and caches it.
#[derive(Clone)]
pub struct ImageFetchStrategy {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn Cache>,
    codec: Arc<dyn ImageCodec>,
}

impl ImageFetchStrategy {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn Cache>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self {
            transport,
            cache,
            codec,
        }
    }

    /// Decode `raw`, rescaling and re-encoding it as PNG when a scale applies
    /// and the image does not already fit.
    ///
    /// Dimensions are read from the header first so an oversized payload is
    /// decoded straight to its target scale.
    fn shape(&self, ctx: &FetchContext<DynamicImage>, raw: Bytes) -> LoadResult<Fetched<DynamicImage>> {
        let locator = ctx.request().locator();
        let dimensions = match self.codec.dimensions(&raw) {
            Ok(dimensions) => Some(dimensions),
            Err(error) => {
                trace!(%locator, %error, "Image header unreadable");
                None
            }
        };
        let Some(scale) = self.cache.resolve_scale(locator, dimensions) else {
            let decoded = self.codec.decode(&raw)?;
            return Ok(Fetched::new(raw, decoded));
        };

        let scaled = match dimensions {
            Some((width, height)) if scale.contains(width, height) => {
                let decoded = self.codec.decode(&raw)?;
                return Ok(Fetched::new(raw, decoded));
            }
            Some(_) => {
                ctx.ensure_continue()?;
                self.codec.decode_to_fit(&raw, scale)?
            }
            None => {
                let decoded = self.codec.decode(&raw)?;
                if scale.contains(decoded.width(), decoded.height()) {
                    return Ok(Fetched::new(raw, decoded));
                }
                ctx.ensure_continue()?;
                self.codec.scale_to_fit(&decoded, scale)
            }
        };

        let encoded = Bytes::from(self.codec.encode_png(&scaled)?);
        debug!(
            %locator,
            %scale,
            from = raw.len(),
            to = encoded.len(),
            "Rescaled image"
        );
        Ok(Fetched::new(encoded, scaled))
    }
}

impl FetchStrategy for ImageFetchStrategy {
    type Output = DynamicImage;

    fn fetch(&self, ctx: &FetchContext<DynamicImage>) -> LoadResult<Fetched<DynamicImage>> {
        let raw = ctx.download(self.transport.as_ref())?;
        let fetched = self.shape(ctx, raw)?;

        let locator = ctx.request().locator();
        if !self.cache.put(locator, fetched.raw.clone()) {
            debug!(%locator, bytes = fetched.raw.len(), "Cache rejected image");
        }
        Ok(fetched)
    }
}

/// Serves an image from the cache, falling back to the network when the
/// entry was evicted after routing.
#[derive(Clone)]
pub struct ImageCacheStrategy {
    cache: Arc<dyn Cache>,
    codec: Arc<dyn ImageCodec>,
    fallback: ImageFetchStrategy,
}

impl ImageCacheStrategy {
    pub fn new(fallback: ImageFetchStrategy) -> Self {
        Self {
            cache: Arc::clone(&fallback.cache),
            codec: Arc::clone(&fallback.codec),
            fallback,
        }
    }
}

impl FetchStrategy for ImageCacheStrategy {
    type Output = DynamicImage;

    fn fetch(&self, ctx: &FetchContext<DynamicImage>) -> LoadResult<Fetched<DynamicImage>> {
        let locator = ctx.request().locator();
        let Some(raw) = self.cache.get(locator) else {
            debug!(%locator, "Cache entry vanished; fetching");
            return self.fallback.fetch(ctx);
        };
        let decoded = self.codec.decode(&raw)?;
        Ok(Fetched::new(raw, decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadq_core::{Connection, Request, Scale, TransportRequest};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::BudgetCache;
    use crate::codec::ImageCrateCodec;

    struct Fixed(&'static [u8]);

    impl Transport for Fixed {
        fn open(&self, _request: TransportRequest) -> LoadResult<Connection> {
            Ok(Connection::new(
                Some(self.0.len() as u64),
                Cursor::new(self.0.to_vec()),
            ))
        }
    }

    /// Pretends every payload is a blank image of `size` and counts decodes.
    struct CountingCodec {
        size: (u32, u32),
        readable_header: bool,
        full_decodes: AtomicUsize,
        fitted_decodes: AtomicUsize,
    }

    impl CountingCodec {
        fn new(width: u32, height: u32) -> Arc<Self> {
            Arc::new(Self {
                size: (width, height),
                readable_header: true,
                full_decodes: AtomicUsize::new(0),
                fitted_decodes: AtomicUsize::new(0),
            })
        }

        fn headerless(width: u32, height: u32) -> Arc<Self> {
            Arc::new(Self {
                size: (width, height),
                readable_header: false,
                full_decodes: AtomicUsize::new(0),
                fitted_decodes: AtomicUsize::new(0),
            })
        }

        fn blank(&self) -> DynamicImage {
            DynamicImage::new_rgb8(self.size.0, self.size.1)
        }
    }

    impl ImageCodec for CountingCodec {
        fn decode(&self, _bytes: &[u8]) -> LoadResult<DynamicImage> {
            self.full_decodes.fetch_add(1, Ordering::SeqCst);
            Ok(self.blank())
        }

        fn dimensions(&self, _bytes: &[u8]) -> LoadResult<(u32, u32)> {
            if self.readable_header {
                Ok(self.size)
            } else {
                Err(loadq_core::LoadError::decode("no header"))
            }
        }

        fn scale_to_fit(&self, image: &DynamicImage, scale: Scale) -> DynamicImage {
            ImageCrateCodec::new().scale_to_fit(image, scale)
        }

        fn decode_to_fit(&self, _bytes: &[u8], scale: Scale) -> LoadResult<DynamicImage> {
            self.fitted_decodes.fetch_add(1, Ordering::SeqCst);
            Ok(self.scale_to_fit(&self.blank(), scale))
        }

        fn encode_png(&self, _image: &DynamicImage) -> LoadResult<Vec<u8>> {
            Ok(b"rescaled".to_vec())
        }
    }

    fn fetch(codec: Arc<CountingCodec>, cache: Arc<dyn Cache>) -> Fetched<DynamicImage> {
        let strategy = ImageFetchStrategy::new(Arc::new(Fixed(b"opaque payload")), cache, codec);
        let ctx = FetchContext::detached(Request::parse("http://img.test/a").unwrap());
        strategy.fetch(&ctx).unwrap()
    }

    #[test]
    fn test_ceiling_uses_injected_codec_dimensions() {
        let cache = Arc::new(BudgetCache::default().with_ceiling(Scale::square(64)));
        let fetched = fetch(CountingCodec::new(200, 100), Arc::clone(&cache) as Arc<dyn Cache>);

        assert_eq!((fetched.output.width(), fetched.output.height()), (64, 32));
        assert_eq!(fetched.raw.as_ref(), b"rescaled");
        let key = Request::parse("http://img.test/a").unwrap();
        assert_eq!(cache.get(key.locator()).as_deref(), Some(&b"rescaled"[..]));
    }

    #[test]
    fn test_ceiling_skips_full_size_decode() {
        let codec = CountingCodec::new(200, 100);
        let cache = Arc::new(BudgetCache::default().with_ceiling(Scale::square(64)));
        fetch(Arc::clone(&codec), cache);

        assert_eq!(codec.full_decodes.load(Ordering::SeqCst), 0);
        assert_eq!(codec.fitted_decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fitting_payload_keeps_original_bytes() {
        let codec = CountingCodec::new(50, 20);
        let cache = Arc::new(BudgetCache::default().with_ceiling(Scale::square(64)));
        let fetched = fetch(Arc::clone(&codec), cache);

        assert_eq!(fetched.raw.as_ref(), b"opaque payload");
        assert_eq!((fetched.output.width(), fetched.output.height()), (50, 20));
        assert_eq!(codec.full_decodes.load(Ordering::SeqCst), 1);
        assert_eq!(codec.fitted_decodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remembered_scale_without_header_rescales_after_decode() {
        let codec = CountingCodec::headerless(200, 100);
        let cache = Arc::new(BudgetCache::default());
        let key = Request::parse("http://img.test/a").unwrap();
        cache.set_scale(key.locator(), Scale::square(100));
        let fetched = fetch(Arc::clone(&codec), cache);

        assert_eq!((fetched.output.width(), fetched.output.height()), (100, 50));
        assert_eq!(codec.full_decodes.load(Ordering::SeqCst), 1);
        assert_eq!(codec.fitted_decodes.load(Ordering::SeqCst), 0);
    }
}

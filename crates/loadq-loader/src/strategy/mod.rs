//! Fetch strategies plugged into the loader engine.
//!
//! A strategy turns one request into raw bytes plus a decoded result. The
//! engine owns everything around it: queueing, flags, `Started`/terminal
//! events and the per-item error boundary.

mod image_fetch;
mod upload;

use std::sync::Arc;

use bytes::Bytes;
use loadq_core::{LoadResult, Transport};

use crate::engine::FetchContext;

pub use image_fetch::{ImageCacheStrategy, ImageFetchStrategy};
pub use upload::UploadStrategy;

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    /// Bytes as transferred or stored.
    pub raw: Bytes,
    pub output: T,
}

impl<T> Fetched<T> {
    pub const fn new(raw: Bytes, output: T) -> Self {
        Self { raw, output }
    }
}

/// Per-request fetch behaviour.
pub trait FetchStrategy: Send + Sync + 'static {
    /// Decoded result delivered with `Finished`.
    type Output: Send + Sync + 'static;

    /// Process `ctx.request()`.
    ///
    /// Long transfers should go through the context so flags and progress
    /// are honoured. Errors become a `Failed` event.
    fn fetch(&self, ctx: &FetchContext<Self::Output>) -> LoadResult<Fetched<Self::Output>>;
}

/// Downloads the composed locator and delivers the bytes as-is.
#[derive(Clone)]
pub struct RawStrategy {
    transport: Arc<dyn Transport>,
}

impl RawStrategy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl FetchStrategy for RawStrategy {
    type Output = Bytes;

    fn fetch(&self, ctx: &FetchContext<Bytes>) -> LoadResult<Fetched<Bytes>> {
        let raw = ctx.download(self.transport.as_ref())?;
        Ok(Fetched::new(raw.clone(), raw))
    }
}

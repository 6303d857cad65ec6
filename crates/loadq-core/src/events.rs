//! Load events - discriminated union for everything a loader reports.
//!
//! Per request the order is fixed:
//!
//! ```text
//! Started -> UploadProgress* -> DownloadProgress* -> (Finished | Failed)
//! ```

use std::sync::Arc;

use bytes::Bytes;

use crate::error::LoadError;
use crate::request::Request;

/// An event emitted by a loader for one request.
///
/// `T` is the decoded result produced by the fetch strategy.
#[derive(Debug)]
pub enum LoadEvent<T> {
    /// The worker picked the request up.
    Started {
        /// Request being processed.
        request: Arc<Request>,
    },

    /// Multipart body bytes written so far.
    UploadProgress {
        /// Request being processed.
        request: Arc<Request>,
        /// Entity bytes sent.
        sent: u64,
        /// Sum of all entity lengths.
        total: u64,
    },

    /// Response bytes read so far.
    DownloadProgress {
        /// Request being processed.
        request: Arc<Request>,
        /// Bytes received.
        received: u64,
        /// Declared response length.
        total: u64,
    },

    /// The request completed.
    Finished {
        /// Request that completed.
        request: Arc<Request>,
        /// Bytes as transferred (or as stored in the cache).
        raw: Bytes,
        /// Decoded result.
        output: Arc<T>,
    },

    /// The request failed. No retry follows.
    Failed {
        /// Request that failed.
        request: Arc<Request>,
        /// Cause of the failure.
        error: LoadError,
    },
}

impl<T> LoadEvent<T> {
    /// The request this event is about.
    pub const fn request(&self) -> &Arc<Request> {
        match self {
            Self::Started { request }
            | Self::UploadProgress { request, .. }
            | Self::DownloadProgress { request, .. }
            | Self::Finished { request, .. }
            | Self::Failed { request, .. } => request,
        }
    }

    /// `Finished` or `Failed`.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }

    /// Short name of the variant, for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::UploadProgress { .. } => "upload_progress",
            Self::DownloadProgress { .. } => "download_progress",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
        }
    }
}

// Manual impl: `T` itself does not need to be `Clone`.
impl<T> Clone for LoadEvent<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Started { request } => Self::Started {
                request: Arc::clone(request),
            },
            Self::UploadProgress {
                request,
                sent,
                total,
            } => Self::UploadProgress {
                request: Arc::clone(request),
                sent: *sent,
                total: *total,
            },
            Self::DownloadProgress {
                request,
                received,
                total,
            } => Self::DownloadProgress {
                request: Arc::clone(request),
                received: *received,
                total: *total,
            },
            Self::Finished {
                request,
                raw,
                output,
            } => Self::Finished {
                request: Arc::clone(request),
                raw: raw.clone(),
                output: Arc::clone(output),
            },
            Self::Failed { request, error } => Self::Failed {
                request: Arc::clone(request),
                error: error.clone(),
            },
        }
    }
}

/// Observer of load events.
///
/// Callbacks run on the loader's delivery context, or inline on the worker
/// thread when full-async delivery is on. They should return quickly.
pub trait LoadListener<T>: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &LoadEvent<T>);
}

impl<T, F> LoadListener<T> for F
where
    F: Fn(&LoadEvent<T>) + Send + Sync,
{
    fn on_event(&self, event: &LoadEvent<T>) {
        self(event);
    }
}

/// A listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl<T> LoadListener<T> for NoopListener {
    fn on_event(&self, _event: &LoadEvent<T>) {}
}

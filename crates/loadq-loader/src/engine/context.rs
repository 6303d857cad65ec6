//! Per-item fetch context and the shared byte-transfer primitive.
//!
//! A [`FetchContext`] is what a fetch strategy sees of the engine: the
//! request being processed, the cooperative flags, and progress reporting.
//! Transfers honour both flags between chunks; an in-flight chunk always
//! completes before a flag takes effect.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use loadq_core::{
    Connection, LoadError, LoadEvent, LoadResult, LoaderConfig, MULTIPART_CONTENT_TYPE,
    MULTIPART_PREAMBLE, Part, Request, Transport, TransportRequest, UploadBody,
};
use tracing::debug;

use crate::progress::TransferProgress;

use super::dispatch::Dispatcher;

/// Upper bound for buffer preallocation from a declared length.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// The engine's view offered to a fetch strategy for one request.
pub struct FetchContext<T> {
    request: Arc<Request>,
    dispatcher: Dispatcher<T>,
    chunk_size: usize,
    progress_interval: Duration,
}

impl<T> Clone for FetchContext<T> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            dispatcher: self.dispatcher.clone(),
            chunk_size: self.chunk_size,
            progress_interval: self.progress_interval,
        }
    }
}

impl<T: Send + Sync + 'static> FetchContext<T> {
    pub(crate) fn new(request: Arc<Request>, dispatcher: Dispatcher<T>, config: &LoaderConfig) -> Self {
        Self {
            request,
            dispatcher,
            chunk_size: config.effective_chunk_size(),
            progress_interval: config.progress_interval(),
        }
    }

    /// A context with no listeners, for exercising strategies directly.
    #[cfg(test)]
    pub(crate) fn detached(request: Request) -> Self {
        use super::dispatch::{Flags, ListenerSet};

        let dispatcher = Dispatcher::new(
            Arc::new(ListenerSet::new()),
            Arc::new(Flags::new(true)),
            Arc::new(loadq_core::InlineDelivery),
        );
        Self::new(Arc::new(request), dispatcher, &LoaderConfig::default())
    }

    /// The request being processed.
    pub const fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Work is allowed and the item has not been cancelled.
    pub fn can_continue(&self) -> bool {
        self.dispatcher.flags().can_continue()
    }

    /// `Err(Cancelled)` once either flag says stop.
    pub fn ensure_continue(&self) -> LoadResult<()> {
        if self.can_continue() {
            Ok(())
        } else {
            Err(LoadError::Cancelled)
        }
    }

    pub fn report_upload(&self, sent: u64, total: u64) {
        self.dispatcher.dispatch(LoadEvent::UploadProgress {
            request: Arc::clone(&self.request),
            sent,
            total,
        });
    }

    pub fn report_download(&self, received: u64, total: u64) {
        self.dispatcher.dispatch(LoadEvent::DownloadProgress {
            request: Arc::clone(&self.request),
            received,
            total,
        });
    }

    /// Open the request on `transport`, sending `body` if given.
    ///
    /// GET requests use the composed locator. A transport failure that
    /// happens after a flag was raised is reported as `Cancelled`.
    pub fn open(
        &self,
        transport: &dyn Transport,
        body: Option<UploadBody>,
    ) -> LoadResult<Connection> {
        self.ensure_continue()?;
        let request = TransportRequest {
            locator: self.request.compose_locator(),
            method: self.request.method(),
            body,
        };
        transport.open(request).map_err(|e| {
            if self.can_continue() {
                e
            } else {
                LoadError::Cancelled
            }
        })
    }

    /// Read a response stream to the end.
    ///
    /// Records the declared length on the request, copies in chunks while
    /// both flags allow, and reports throttled download progress. The final
    /// progress event is always reported.
    pub fn read_body(&self, connection: Connection) -> LoadResult<Bytes> {
        let Connection {
            declared_length,
            mut body,
        } = connection;
        if declared_length.is_some() {
            self.request.set_response_length(declared_length);
        }
        let expected = declared_length.or_else(|| self.request.response_length());

        let capacity = expected.map_or(self.chunk_size, |n| {
            usize::try_from(n.min(MAX_PREALLOCATION)).unwrap_or(self.chunk_size)
        });
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut chunk = vec![0u8; self.chunk_size];
        let mut progress = TransferProgress::new(expected, self.progress_interval);

        loop {
            self.ensure_continue()?;
            let n = match body.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(if self.can_continue() {
                        LoadError::from(e)
                    } else {
                        LoadError::Cancelled
                    });
                }
            };
            buffer.extend_from_slice(&chunk[..n]);
            if let Some((received, total)) = progress.advance(n) {
                self.report_download(received, total);
            }
        }

        if let Some((received, total)) = progress.finish() {
            self.report_download(received, total);
        }
        debug!(
            locator = %self.request.locator(),
            bytes = buffer.len(),
            "Transfer complete"
        );
        Ok(buffer.freeze())
    }

    /// Open the request and read the whole response.
    pub fn download(&self, transport: &dyn Transport) -> LoadResult<Bytes> {
        let connection = self.open(transport, None)?;
        self.read_body(connection)
    }

    /// Build a multipart upload body for `parts`.
    ///
    /// Reading the body reports upload progress over the entity bytes (the
    /// leading boundary line is not counted) and fails once a flag is
    /// raised.
    pub fn multipart_body(&self, parts: &[Part]) -> UploadBody {
        let entities: VecDeque<Bytes> = parts.iter().map(Part::encode_entity).collect();
        let total: u64 = entities.iter().map(|e| e.len() as u64).sum();
        let stream = UploadStream {
            ctx: self.clone(),
            preamble: Bytes::from_static(MULTIPART_PREAMBLE.as_bytes()),
            entities,
            progress: TransferProgress::new(Some(total), self.progress_interval),
            total,
        };
        UploadBody {
            content_type: MULTIPART_CONTENT_TYPE.to_string(),
            length: MULTIPART_PREAMBLE.len() as u64 + total,
            reader: Box::new(stream),
        }
    }
}

/// A multipart body streamed in chunks, reporting upload progress.
struct UploadStream<T> {
    ctx: FetchContext<T>,
    preamble: Bytes,
    entities: VecDeque<Bytes>,
    progress: TransferProgress,
    total: u64,
}

impl<T: Send + Sync + 'static> Read for UploadStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.ctx.can_continue() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "upload cancelled",
            ));
        }

        let limit = buf.len().min(self.ctx.chunk_size);
        if !self.preamble.is_empty() {
            let n = limit.min(self.preamble.len());
            buf[..n].copy_from_slice(&self.preamble.split_to(n));
            return Ok(n);
        }

        while self.entities.front().is_some_and(Bytes::is_empty) {
            self.entities.pop_front();
        }
        let Some(entity) = self.entities.front_mut() else {
            if let Some((sent, total)) = self.progress.finish() {
                self.ctx.report_upload(sent, total);
            }
            return Ok(0);
        };

        let n = limit.min(entity.len());
        buf[..n].copy_from_slice(&entity.split_to(n));
        if let Some((sent, total)) = self.progress.advance(n) {
            self.ctx.report_upload(sent, total);
        }
        if self.progress.transferred() == self.total {
            if let Some((sent, total)) = self.progress.finish() {
                self.ctx.report_upload(sent, total);
            }
        }
        Ok(n)
    }
}

//! Transport port.
//!
//! A transport resolves a locator into a readable byte stream. For POST
//! requests it also consumes a streamed upload body before the response is
//! read. Implementations block; the loader only calls them from worker
//! threads.

use std::fmt;
use std::io::Read;

use url::Url;

use crate::error::LoadResult;
use crate::request::Method;

/// A streamed request body.
pub struct UploadBody {
    /// `Content-Type` header value.
    pub content_type: String,
    /// Exact number of bytes `reader` yields.
    pub length: u64,
    /// Body stream. Reading it drives upload progress.
    pub reader: Box<dyn Read + Send>,
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBody")
            .field("content_type", &self.content_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// What the loader asks a transport to open.
#[derive(Debug)]
pub struct TransportRequest {
    /// Fully composed locator (query string already applied for GET).
    pub locator: Url,
    pub method: Method,
    /// Present for POST requests carrying parts.
    pub body: Option<UploadBody>,
}

/// An open response stream.
pub struct Connection {
    /// Length announced by the server, if any.
    pub declared_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl Connection {
    pub fn new(declared_length: Option<u64>, body: impl Read + Send + 'static) -> Self {
        Self {
            declared_length,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("declared_length", &self.declared_length)
            .finish_non_exhaustive()
    }
}

/// Port for opening byte streams.
///
/// Errors are reported as [`LoadError::Transport`](crate::LoadError::Transport)
/// or [`LoadError::Io`](crate::LoadError::Io). Timeouts are the
/// implementation's business.
pub trait Transport: Send + Sync {
    /// Send `request` and return the response stream.
    ///
    /// When `request.body` is present the implementation must read it to the
    /// end (or fail) before returning.
    fn open(&self, request: TransportRequest) -> LoadResult<Connection>;
}

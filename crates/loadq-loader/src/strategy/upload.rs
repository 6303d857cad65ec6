//! Multipart upload strategy.

use std::sync::Arc;

use bytes::Bytes;
use loadq_core::{LoadResult, Method, Transport};
use tracing::debug;

use crate::engine::FetchContext;

use super::{FetchStrategy, Fetched};

/// Sends the request's parts as a multipart body when the method is POST,
/// then reads the response.
///
/// GET requests skip the upload stage; their parts already travel in the
/// composed locator.
#[derive(Clone)]
pub struct UploadStrategy {
    transport: Arc<dyn Transport>,
}

impl UploadStrategy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl FetchStrategy for UploadStrategy {
    type Output = Bytes;

    fn fetch(&self, ctx: &FetchContext<Bytes>) -> LoadResult<Fetched<Bytes>> {
        let request = ctx.request();
        let body = match request.method() {
            Method::Post => {
                let parts = request.parts().unwrap_or_default();
                let body = ctx.multipart_body(parts);
                debug!(
                    locator = %request.locator(),
                    parts = parts.len(),
                    bytes = body.length,
                    "Uploading multipart body"
                );
                Some(body)
            }
            Method::Get => None,
        };

        let connection = ctx.open(self.transport.as_ref(), body)?;
        let raw = ctx.read_body(connection)?;
        Ok(Fetched::new(raw.clone(), raw))
    }
}

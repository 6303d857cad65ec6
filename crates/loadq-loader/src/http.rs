//! reqwest-backed [`Transport`].

use reqwest::blocking::{Body, Client};
use reqwest::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use reqwest::StatusCode;
use loadq_core::{
    Connection, HttpTransportConfig, LoadError, LoadResult, Method, Transport, TransportRequest,
};
use tracing::debug;

/// Blocking HTTP transport.
///
/// Sends `Connection: Keep-Alive` and `Cache-Control: no-cache`. A
/// non-success status is a transport error carrying the status code.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> LoadResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LoadError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn check_status(status: StatusCode, locator: &str) -> LoadResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(LoadError::transport_with_status(
        format!(
            "{locator} answered {}",
            status.canonical_reason().unwrap_or("unexpected status")
        ),
        status.as_u16(),
    ))
}

impl Transport for HttpTransport {
    fn open(&self, request: TransportRequest) -> LoadResult<Connection> {
        let TransportRequest {
            locator,
            method,
            body,
        } = request;
        debug!(%locator, %method, "Opening HTTP connection");

        let mut builder = match method {
            Method::Get => self.client.get(locator.clone()),
            Method::Post => self.client.post(locator.clone()),
        }
        .header(CONNECTION, "Keep-Alive")
        .header(CACHE_CONTROL, "no-cache");

        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, body.content_type)
                .body(Body::sized(body.reader, body.length));
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                LoadError::transport(format!("{locator} timed out: {e}"))
            } else {
                LoadError::transport(e.to_string())
            }
        })?;
        check_status(response.status(), locator.as_str())?;

        Ok(Connection::new(response.content_length(), response))
    }
}

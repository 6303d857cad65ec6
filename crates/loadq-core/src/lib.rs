//! Core domain types and ports for loadq.
//!
//! This crate holds everything the loader engine and its adapters agree on:
//! requests and their multipart parts, the error taxonomy, the event
//! contract, configuration, and the ports (transport, image codec, delivery
//! context) that infrastructure implements. It performs no I/O of its own.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod events;
pub mod ports;
pub mod request;
pub mod types;

pub use config::{
    CacheKind, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_DECODABLE_DIMENSION,
    DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_SCALE_TOLERANCE, HttpTransportConfig,
    ImageLoaderConfig, LoaderConfig,
};
pub use error::{LoadError, LoadResult};
pub use events::{LoadEvent, LoadListener, NoopListener};
pub use ports::{
    Connection, DeliveryContext, ImageCodec, InlineDelivery, Task, Transport, TransportRequest,
    UploadBody,
};
pub use request::{
    BOUNDARY, MAX_COMPOSED_LEN, MAX_QUERY_VALUE_LEN, MULTIPART_CONTENT_TYPE, MULTIPART_PREAMBLE,
    Method, Part, PartImageFormat, Request,
};
pub use types::Scale;

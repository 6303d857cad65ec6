//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define what the loader expects from infrastructure: a way to open
//! byte streams, a way to decode and rescale images, and a place to run
//! listener callbacks. They use only domain types.

pub mod codec;
pub mod delivery;
pub mod transport;

pub use codec::ImageCodec;
pub use delivery::{DeliveryContext, InlineDelivery, Task};
pub use transport::{Connection, Transport, TransportRequest, UploadBody};

//! Progress tracking and throttling.
//!
//! Turns a stream of chunk sizes into rate-limited progress updates for one
//! transfer.

mod throttle;

pub use throttle::TransferProgress;

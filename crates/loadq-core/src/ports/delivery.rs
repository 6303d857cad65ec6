//! Delivery context port.
//!
//! When full-async delivery is off, every listener callback is posted to a
//! single [`DeliveryContext`] owned by the caller. Posting never blocks the
//! worker.

/// A unit of work posted to a delivery context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Port for running listener callbacks somewhere other than the worker.
///
/// Implementations must run posted tasks in submission order.
pub trait DeliveryContext: Send + Sync {
    /// Queue `task` for execution.
    fn post(&self, task: Task);
}

/// Runs each task immediately on the posting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDelivery;

impl DeliveryContext for InlineDelivery {
    fn post(&self, task: Task) {
        task();
    }
}

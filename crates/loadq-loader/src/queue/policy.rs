//! Dedup policies deciding when two requests count as the same queue entry.

use std::sync::Arc;

use loadq_core::Request;

/// Equality rule used by a [`RequestQueue`](super::RequestQueue).
pub trait DedupPolicy: Send + Sync + 'static {
    fn same(a: &Arc<Request>, b: &Arc<Request>) -> bool;
}

/// Two entries are the same only if they are the same `Arc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByIdentity;

impl DedupPolicy for ByIdentity {
    fn same(a: &Arc<Request>, b: &Arc<Request>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

/// Two entries are the same if their locators are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByLocator;

impl DedupPolicy for ByLocator {
    fn same(a: &Arc<Request>, b: &Arc<Request>) -> bool {
        a.locator() == b.locator()
    }
}

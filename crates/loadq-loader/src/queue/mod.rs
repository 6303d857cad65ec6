//! Request queue.
//!
//! A FIFO of pending requests plus a "current" slot holding the request most
//! recently handed to the worker.
//!
//! # Design
//!
//! - Every operation takes one internal lock, so the owning worker and the
//!   caller may use the queue at the same time
//! - At most one pending entry per dedup key; a duplicate add is ignored
//! - Dequeue order is submission order, no priorities

mod policy;

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loadq_core::Request;
use url::Url;

pub use policy::{ByIdentity, ByLocator, DedupPolicy};

/// Queue deduplicating by instance identity.
pub type DefaultQueue = RequestQueue<ByIdentity>;

/// Queue deduplicating by locator.
pub type LocatorQueue = RequestQueue<ByLocator>;

/// The queue operations a loader engine needs.
///
/// Object safe so one engine type can drive either dedup flavour.
pub trait Queue: Send + Sync {
    /// Append at the tail. Returns `false` if a duplicate is already queued.
    fn add(&self, request: Arc<Request>) -> bool;

    /// Pop the head into the "current" slot and return it.
    fn next(&self) -> Option<Arc<Request>>;

    /// Remove every pending entry matching `request`. Returns how many went.
    fn remove(&self, request: &Arc<Request>) -> usize;

    /// Empty the queue and reset "current".
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, request: &Arc<Request>) -> bool;

    /// The request most recently returned by [`Queue::next`], if still active.
    fn current(&self) -> Option<Arc<Request>>;

    /// Reset the "current" slot.
    fn clear_current(&self);

    /// Pending requests in order.
    fn snapshot(&self) -> Vec<Arc<Request>>;
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Arc<Request>>,
    current: Option<Arc<Request>>,
}

/// Mutation-safe FIFO of requests.
pub struct RequestQueue<P = ByIdentity> {
    state: Mutex<QueueState>,
    _policy: PhantomData<P>,
}

impl<P: DedupPolicy> Default for RequestQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DedupPolicy> RequestQueue<P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            _policy: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail unless a duplicate is already pending.
    pub fn add(&self, request: Arc<Request>) -> bool {
        let mut state = self.lock();
        if state.pending.iter().any(|queued| P::same(queued, &request)) {
            return false;
        }
        state.pending.push_back(request);
        true
    }

    /// Add each request in order. Returns how many were accepted.
    pub fn add_all(&self, requests: impl IntoIterator<Item = Arc<Request>>) -> usize {
        requests
            .into_iter()
            .map(|request| self.add(request))
            .filter(|added| *added)
            .count()
    }

    /// Place a request at `index` (0 = head).
    ///
    /// Rejected when `index` is past the tail or a duplicate is pending.
    pub fn insert(&self, index: usize, request: Arc<Request>) -> bool {
        let mut state = self.lock();
        if index > state.pending.len()
            || state.pending.iter().any(|queued| P::same(queued, &request))
        {
            return false;
        }
        state.pending.insert(index, request);
        true
    }

    /// Pop the head into "current".
    pub fn next(&self) -> Option<Arc<Request>> {
        let mut state = self.lock();
        let next = state.pending.pop_front();
        if let Some(request) = &next {
            state.current = Some(Arc::clone(request));
        }
        next
    }

    /// Remove every pending entry matching `request`.
    pub fn remove(&self, request: &Arc<Request>) -> usize {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|queued| !P::same(queued, request));
        before - state.pending.len()
    }

    /// Remove the entry at `index`.
    pub fn remove_at(&self, index: usize) -> Option<Arc<Request>> {
        self.lock().pending.remove(index)
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.pending.clear();
        state.current = None;
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn contains(&self, request: &Arc<Request>) -> bool {
        self.index_of(request).is_some()
    }

    /// Position of the first entry matching `request`.
    pub fn index_of(&self, request: &Arc<Request>) -> Option<usize> {
        self.lock()
            .pending
            .iter()
            .position(|queued| P::same(queued, request))
    }

    /// Position of the first entry for `locator`.
    pub fn index_of_locator(&self, locator: &Url) -> Option<usize> {
        self.lock()
            .pending
            .iter()
            .position(|queued| queued.locator() == locator)
    }

    pub fn current(&self) -> Option<Arc<Request>> {
        self.lock().current.clone()
    }

    pub fn clear_current(&self) {
        self.lock().current = None;
    }

    pub fn snapshot(&self) -> Vec<Arc<Request>> {
        self.lock().pending.iter().cloned().collect()
    }
}

impl RequestQueue<ByLocator> {
    /// Remove the pending entry for `locator`.
    pub fn remove_locator(&self, locator: &Url) -> usize {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|queued| queued.locator() != locator);
        before - state.pending.len()
    }

    pub fn contains_locator(&self, locator: &Url) -> bool {
        self.index_of_locator(locator).is_some()
    }
}

impl<P: DedupPolicy> Queue for RequestQueue<P> {
    fn add(&self, request: Arc<Request>) -> bool {
        Self::add(self, request)
    }

    fn next(&self) -> Option<Arc<Request>> {
        Self::next(self)
    }

    fn remove(&self, request: &Arc<Request>) -> usize {
        Self::remove(self, request)
    }

    fn clear(&self) {
        Self::clear(self);
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn contains(&self, request: &Arc<Request>) -> bool {
        Self::contains(self, request)
    }

    fn current(&self) -> Option<Arc<Request>> {
        Self::current(self)
    }

    fn clear_current(&self) {
        Self::clear_current(self);
    }

    fn snapshot(&self) -> Vec<Arc<Request>> {
        Self::snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(locator: &str) -> Arc<Request> {
        Arc::new(Request::parse(locator).unwrap())
    }

    #[test]
    fn test_fifo_order() {
        let queue = DefaultQueue::new();
        let (a, b, c) = (req("http://h/a"), req("http://h/b"), req("http://h/c"));
        assert_eq!(queue.add_all([a.clone(), b.clone(), c.clone()]), 3);

        for (expected, remaining) in [(&a, 2), (&b, 1), (&c, 0)] {
            let next = queue.next().unwrap();
            assert!(Arc::ptr_eq(&next, expected));
            assert_eq!(queue.len(), remaining);
            assert!(Arc::ptr_eq(&queue.current().unwrap(), expected));
        }
        assert!(queue.next().is_none());
    }

    #[test]
    fn test_identity_dedup() {
        let queue = DefaultQueue::new();
        let a = req("http://h/a");
        assert!(queue.add(a.clone()));
        assert!(!queue.add(a.clone()));
        assert_eq!(queue.len(), 1);

        // Same locator, different instance
        assert!(queue.add(req("http://h/a")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_locator_dedup() {
        let queue = LocatorQueue::new();
        assert!(queue.add(req("http://h/a")));
        assert!(!queue.add(req("http://h/a")));
        assert_eq!(queue.len(), 1);

        let locator = Url::parse("http://h/a").unwrap();
        assert!(queue.contains_locator(&locator));
        assert_eq!(queue.remove_locator(&locator), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_insert_and_remove_at() {
        let queue = DefaultQueue::new();
        let (a, b, c) = (req("http://h/a"), req("http://h/b"), req("http://h/c"));
        queue.add(a.clone());
        queue.add(c.clone());
        assert!(queue.insert(1, b.clone()));
        assert!(!queue.insert(9, req("http://h/d")));
        assert!(!queue.insert(0, a.clone()));

        assert_eq!(queue.index_of(&b), Some(1));
        assert_eq!(
            queue.index_of_locator(&Url::parse("http://h/c").unwrap()),
            Some(2)
        );

        let removed = queue.remove_at(0).unwrap();
        assert!(Arc::ptr_eq(&removed, &a));
        assert!(queue.remove_at(5).is_none());
        assert_eq!(queue.snapshot().len(), 2);
    }

    #[test]
    fn test_clear_resets_current() {
        let queue = DefaultQueue::new();
        queue.add(req("http://h/a"));
        queue.add(req("http://h/b"));
        queue.next();
        assert!(queue.current().is_some());

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_trait_object_dispatch() {
        let queue: Arc<dyn Queue> = Arc::new(LocatorQueue::new());
        let a = req("http://h/a");
        assert!(queue.add(a.clone()));
        assert!(!queue.add(req("http://h/a")));
        assert!(queue.contains(&a));
        assert_eq!(queue.remove(&req("http://h/a")), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_adds_keep_one_entry_per_key() {
        let queue = Arc::new(LocatorQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.add(req(&format!("http://h/{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 50);
    }
}

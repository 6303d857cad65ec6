//! Listener registry and event dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use loadq_core::{DeliveryContext, LoadEvent, LoadListener};
use tracing::trace;

/// Cooperative control flags shared by a worker and its callers.
#[derive(Debug)]
pub(crate) struct Flags {
    work_allowed: AtomicBool,
    cancel_current: AtomicBool,
    full_async: AtomicBool,
}

impl Flags {
    pub(crate) const fn new(full_async: bool) -> Self {
        Self {
            work_allowed: AtomicBool::new(true),
            cancel_current: AtomicBool::new(false),
            full_async: AtomicBool::new(full_async),
        }
    }

    pub(crate) fn work_allowed(&self) -> bool {
        self.work_allowed.load(Ordering::Acquire)
    }

    pub(crate) fn set_work_allowed(&self, allowed: bool) {
        self.work_allowed.store(allowed, Ordering::Release);
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_current.load(Ordering::Acquire)
    }

    pub(crate) fn set_cancel_current(&self, cancel: bool) {
        self.cancel_current.store(cancel, Ordering::Release);
    }

    pub(crate) fn full_async(&self) -> bool {
        self.full_async.load(Ordering::Acquire)
    }

    pub(crate) fn set_full_async(&self, full_async: bool) {
        self.full_async.store(full_async, Ordering::Release);
    }

    /// Work is allowed and the current item is not cancelled.
    pub(crate) fn can_continue(&self) -> bool {
        self.work_allowed() && !self.cancel_requested()
    }
}

/// A set of distinct listeners.
///
/// Listeners are compared by address, so adding the same `Arc` twice is a
/// no-op. Dispatch iterates over a snapshot, so listeners may be added or
/// removed from any thread while events are being delivered.
pub struct ListenerSet<T> {
    listeners: RwLock<Vec<Arc<dyn LoadListener<T>>>>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<T> ListenerSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the listener was already registered.
    pub fn add(&self, listener: Arc<dyn LoadListener<T>>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Returns `false` if the listener was not registered.
    pub fn remove(&self, listener: &Arc<dyn LoadListener<T>>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn LoadListener<T>>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Routes events to listeners under the loader's delivery discipline.
pub(crate) struct Dispatcher<T> {
    listeners: Arc<ListenerSet<T>>,
    flags: Arc<Flags>,
    delivery: Arc<dyn DeliveryContext>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            flags: Arc::clone(&self.flags),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<T: Send + Sync + 'static> Dispatcher<T> {
    pub(crate) const fn new(
        listeners: Arc<ListenerSet<T>>,
        flags: Arc<Flags>,
        delivery: Arc<dyn DeliveryContext>,
    ) -> Self {
        Self {
            listeners,
            flags,
            delivery,
        }
    }

    pub(crate) const fn flags(&self) -> &Arc<Flags> {
        &self.flags
    }

    /// Deliver `event` to every listener.
    ///
    /// Dropped silently when work was stopped or the current item cancelled.
    pub(crate) fn dispatch(&self, event: LoadEvent<T>) {
        if !self.flags.can_continue() {
            trace!(
                event = event.kind(),
                locator = %event.request().locator(),
                "Dropping event"
            );
            return;
        }

        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return;
        }

        if self.flags.full_async() {
            for listener in &listeners {
                listener.on_event(&event);
            }
        } else {
            self.delivery.post(Box::new(move || {
                for listener in &listeners {
                    listener.on_event(&event);
                }
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadq_core::{InlineDelivery, Request};
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(seen: &Seen) -> Arc<dyn LoadListener<()>> {
        let seen = Arc::clone(seen);
        Arc::new(move |event: &LoadEvent<()>| seen.lock().unwrap().push(event.kind()))
    }

    fn started() -> LoadEvent<()> {
        LoadEvent::Started {
            request: Arc::new(Request::parse("http://h/a").unwrap()),
        }
    }

    #[test]
    fn test_listener_set_is_a_set() {
        let seen = Seen::default();
        let set = ListenerSet::new();
        let listener = recorder(&seen);

        assert!(set.add(Arc::clone(&listener)));
        assert!(!set.add(Arc::clone(&listener)));
        assert_eq!(set.len(), 1);

        assert!(set.remove(&listener));
        assert!(!set.remove(&listener));
        assert!(set.is_empty());
    }

    #[test]
    fn test_dispatch_respects_flags() {
        let seen = Seen::default();
        let listeners = Arc::new(ListenerSet::new());
        listeners.add(recorder(&seen));
        let flags = Arc::new(Flags::new(false));
        let dispatcher = Dispatcher::new(listeners, Arc::clone(&flags), Arc::new(InlineDelivery));

        dispatcher.dispatch(started());
        flags.set_cancel_current(true);
        dispatcher.dispatch(started());
        flags.set_cancel_current(false);
        flags.set_work_allowed(false);
        dispatcher.dispatch(started());

        assert_eq!(*seen.lock().unwrap(), vec!["started"]);
    }

    #[test]
    fn test_full_async_bypasses_delivery_context() {
        struct Never;
        impl DeliveryContext for Never {
            fn post(&self, _task: loadq_core::Task) {
                panic!("delivery context must not be used");
            }
        }

        let seen = Seen::default();
        let listeners = Arc::new(ListenerSet::new());
        listeners.add(recorder(&seen));
        let dispatcher = Dispatcher::new(listeners, Arc::new(Flags::new(true)), Arc::new(Never));

        dispatcher.dispatch(started());
        assert_eq!(*seen.lock().unwrap(), vec!["started"]);
    }
}

//! Loader engine: one worker thread draining one queue.
//!
//! The engine is parameterized by a queue instance and a [`FetchStrategy`].
//! It owns the worker lifecycle, the cooperative flags and event dispatch.
//!
//! # Lifecycle
//!
//! ```text
//!        start()                  stop_work()
//! Idle ----------> Running -----------------> Draining
//!  ^                  |  ^                        |
//!  |   queue empty    |  |        start()         |
//!  +------------------+  +------------------------+
//!  ^                                              |
//!  +------------- worker sees the flag -----------+
//! ```
//!
//! A terminated worker is never reused; `start()` from `Idle` spawns a new
//! thread. The worker decides to exit under the same lock `start()` takes,
//! so an item added just before `start()` is never stranded.

mod context;
mod dispatch;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use loadq_core::{
    DeliveryContext, LoadError, LoadEvent, LoadListener, LoadResult, LoaderConfig, Request,
};
use tracing::{debug, info, warn};

use crate::delivery::ThreadDelivery;
use crate::queue::{DefaultQueue, Queue};
use crate::strategy::FetchStrategy;

pub use context::FetchContext;
pub use dispatch::ListenerSet;

pub(crate) use dispatch::{Dispatcher, Flags};

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// No worker thread.
    Idle,
    /// A worker is draining the queue.
    Running,
    /// Work was stopped; the worker exits at its next flag check.
    Draining,
}

struct Lifecycle {
    state: LoaderState,
    worker: Option<JoinHandle<()>>,
}

struct Shared<S: FetchStrategy> {
    strategy: S,
    queue: Arc<dyn Queue>,
    config: LoaderConfig,
    flags: Arc<Flags>,
    dispatcher: Dispatcher<S::Output>,
    lifecycle: Mutex<Lifecycle>,
}

impl<S: FetchStrategy> Shared<S> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the next item, or go `Idle` when there is nothing to do.
    fn next_item(&self) -> Option<Arc<Request>> {
        let mut lifecycle = self.lifecycle();
        self.flags.set_cancel_current(false);
        let next = if self.flags.work_allowed() {
            self.queue.next()
        } else {
            None
        };
        if next.is_none() {
            lifecycle.state = LoaderState::Idle;
            self.queue.clear_current();
        }
        next
    }

    fn run(&self) {
        info!(thread = %self.config.thread_name, "Loader worker started");
        while let Some(request) = self.next_item() {
            self.process(request);
        }
        info!(thread = %self.config.thread_name, "Loader worker exiting");
    }

    fn process(&self, request: Arc<Request>) {
        debug!(locator = %request.locator(), method = %request.method(), "Processing request");
        self.dispatcher.dispatch(LoadEvent::Started {
            request: Arc::clone(&request),
        });

        let ctx = FetchContext::new(Arc::clone(&request), self.dispatcher.clone(), &self.config);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.strategy.fetch(&ctx)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(locator = %request.locator(), panic = %message, "Fetch strategy panicked");
                Err(LoadError::other(format!("fetch panicked: {message}")))
            });

        match outcome {
            Ok(fetched) => {
                debug!(locator = %request.locator(), bytes = fetched.raw.len(), "Request finished");
                self.dispatcher.dispatch(LoadEvent::Finished {
                    request,
                    raw: fetched.raw,
                    output: Arc::new(fetched.output),
                });
            }
            Err(error) => {
                if error.is_cancelled() {
                    debug!(locator = %request.locator(), "Request cancelled");
                } else {
                    warn!(locator = %request.locator(), error = %error, "Request failed");
                }
                self.dispatcher.dispatch(LoadEvent::Failed { request, error });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Builder for [`Loader`].
pub struct LoaderBuilder<S: FetchStrategy> {
    strategy: S,
    queue: Option<Arc<dyn Queue>>,
    config: LoaderConfig,
    delivery: Option<Arc<dyn DeliveryContext>>,
    listeners: Option<Arc<ListenerSet<S::Output>>>,
}

impl<S: FetchStrategy> LoaderBuilder<S> {
    /// Queue to drain. Defaults to an identity-deduplicating queue.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn Queue>) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Where listener callbacks run when full-async is off.
    ///
    /// Defaults to a dedicated delivery thread.
    #[must_use]
    pub fn delivery(mut self, delivery: Arc<dyn DeliveryContext>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Share a listener set with other loaders.
    #[must_use]
    pub fn listeners(mut self, listeners: Arc<ListenerSet<S::Output>>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn build(self) -> LoadResult<Loader<S>> {
        let delivery = match self.delivery {
            Some(delivery) => delivery,
            None => Arc::new(ThreadDelivery::spawn(format!(
                "{}-delivery",
                self.config.thread_name
            ))?),
        };
        let flags = Arc::new(Flags::new(self.config.full_async));
        let listeners = self.listeners.unwrap_or_default();
        let dispatcher = Dispatcher::new(Arc::clone(&listeners), Arc::clone(&flags), delivery);

        Ok(Loader {
            listeners,
            shared: Arc::new(Shared {
                strategy: self.strategy,
                queue: self
                    .queue
                    .unwrap_or_else(|| Arc::new(DefaultQueue::new())),
                config: self.config,
                flags,
                dispatcher,
                lifecycle: Mutex::new(Lifecycle {
                    state: LoaderState::Idle,
                    worker: None,
                }),
            }),
        })
    }
}

/// A queue drained by one worker thread through a fetch strategy.
///
/// Enqueue and query operations never block on loading. Events for each
/// request follow the order `Started`, progress, then exactly one of
/// `Finished` or `Failed`, unless dropped because work was stopped or the
/// item cancelled.
pub struct Loader<S: FetchStrategy> {
    shared: Arc<Shared<S>>,
    listeners: Arc<ListenerSet<S::Output>>,
}

impl<S: FetchStrategy> Loader<S> {
    pub fn builder(strategy: S) -> LoaderBuilder<S> {
        LoaderBuilder {
            strategy,
            queue: None,
            config: LoaderConfig::default(),
            delivery: None,
            listeners: None,
        }
    }

    /// Loader with default queue, configuration and delivery thread.
    pub fn new(strategy: S) -> LoadResult<Self> {
        Self::builder(strategy).build()
    }

    pub fn strategy(&self) -> &S {
        &self.shared.strategy
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.shared.config
    }

    pub fn listeners(&self) -> &Arc<ListenerSet<S::Output>> {
        &self.listeners
    }

    /// Returns `false` if the listener was already registered.
    pub fn add_listener(&self, listener: Arc<dyn LoadListener<S::Output>>) -> bool {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn LoadListener<S::Output>>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn clear_listeners(&self) {
        self.listeners.clear();
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.shared.queue
    }

    /// Enqueue a request. Does not start the worker.
    pub fn add_to_queue(&self, request: Arc<Request>) -> bool {
        self.shared.queue.add(request)
    }

    pub fn add_all_to_queue(&self, requests: impl IntoIterator<Item = Arc<Request>>) -> usize {
        requests
            .into_iter()
            .filter(|request| self.shared.queue.add(Arc::clone(request)))
            .count()
    }

    pub fn remove_from_queue(&self, request: &Arc<Request>) -> usize {
        self.shared.queue.remove(request)
    }

    pub fn clear_queue(&self) {
        self.shared.queue.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// The request the worker is processing, if any.
    pub fn current(&self) -> Option<Arc<Request>> {
        self.shared.queue.current()
    }

    pub fn state(&self) -> LoaderState {
        self.shared.lifecycle().state
    }

    /// Allow work and make sure a worker is draining the queue.
    pub fn start(&self) -> LoadResult<()> {
        let mut lifecycle = self.shared.lifecycle();
        self.shared.flags.set_work_allowed(true);
        match lifecycle.state {
            LoaderState::Running => {}
            LoaderState::Draining => lifecycle.state = LoaderState::Running,
            LoaderState::Idle => {
                let shared = Arc::clone(&self.shared);
                let handle = thread::Builder::new()
                    .name(self.shared.config.thread_name.clone())
                    .spawn(move || shared.run())
                    .map_err(|e| LoadError::other(format!("failed to spawn loader worker: {e}")))?;
                lifecycle.state = LoaderState::Running;
                lifecycle.worker = Some(handle);
            }
        }
        Ok(())
    }

    /// Set the "should continue" flag without starting a worker.
    pub fn allow_work(&self) {
        self.shared.flags.set_work_allowed(true);
        let mut lifecycle = self.shared.lifecycle();
        if lifecycle.state == LoaderState::Draining {
            lifecycle.state = LoaderState::Running;
        }
    }

    /// Stop after the current chunk. Pending requests stay queued.
    pub fn stop_work(&self) {
        let mut lifecycle = self.shared.lifecycle();
        self.shared.flags.set_work_allowed(false);
        if lifecycle.state == LoaderState::Running {
            lifecycle.state = LoaderState::Draining;
        }
    }

    pub fn is_work_allowed(&self) -> bool {
        self.shared.flags.work_allowed()
    }

    /// Abort the in-flight request. Cleared before the next one starts.
    pub fn cancel_current(&self) {
        self.shared.flags.set_cancel_current(true);
    }

    /// Run listener callbacks inline on the worker instead of posting them.
    pub fn set_full_async(&self, full_async: bool) {
        self.shared.flags.set_full_async(full_async);
    }

    pub fn is_full_async(&self) -> bool {
        self.shared.flags.full_async()
    }

    /// Block until the current worker thread exits.
    ///
    /// Returns immediately when no worker was started. Must not be called
    /// from a listener running inline on the worker.
    pub fn join(&self) {
        let worker = self.shared.lifecycle().worker.take();
        if let Some(handle) = worker {
            if handle.thread().id() == thread::current().id() {
                warn!("join() called from the worker thread; ignoring");
                self.shared.lifecycle().worker = Some(handle);
                return;
            }
            if handle.join().is_err() {
                warn!(thread = %self.shared.config.thread_name, "Loader worker panicked");
            }
        }
    }

    /// Stop work and clear the queue.
    pub fn reset(&self) {
        self.stop_work();
        self.shared.queue.clear();
    }
}

impl<S: FetchStrategy> Drop for Loader<S> {
    fn drop(&mut self) {
        self.stop_work();
    }
}

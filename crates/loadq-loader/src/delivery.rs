//! Delivery contexts for listener callbacks.
//!
//! Two flavours are provided:
//!
//! - [`MainLoop`]: a caller-owned pump. Worker threads post callbacks through
//!   a [`MainLoopHandle`]; the owning thread runs them with
//!   [`MainLoop::run_pending`] or awaits them with [`MainLoop::tick`].
//! - [`ThreadDelivery`]: a dedicated thread running callbacks as they
//!   arrive. Used when a loader is built without a delivery context.
//!
//! Both run tasks in submission order.

use std::thread;
use std::time::{Duration, Instant};

use loadq_core::{DeliveryContext, LoadError, LoadResult, Task};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, trace};

/// Cloneable sender side of a [`MainLoop`].
#[derive(Debug, Clone)]
pub struct MainLoopHandle {
    tx: UnboundedSender<Task>,
}

impl DeliveryContext for MainLoopHandle {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            trace!("Main loop dropped; discarding posted callback");
        }
    }
}

/// A callback queue drained by the thread that owns it.
#[derive(Debug)]
pub struct MainLoop {
    tx: UnboundedSender<Task>,
    rx: UnboundedReceiver<Task>,
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A delivery context posting into this loop.
    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every callback posted so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Pump callbacks on the current thread until `done` returns true or
    /// `timeout` elapses. Returns the final value of `done`.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait for at least one callback, then run everything pending.
    pub async fn tick(&mut self) -> usize {
        match self.rx.recv().await {
            Some(task) => {
                task();
                1 + self.run_pending()
            }
            None => 0,
        }
    }

    /// Run callbacks as they arrive, forever.
    ///
    /// Intended for `tokio::select!` or a task that is aborted on shutdown.
    pub async fn run(&mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
    }
}

/// Runs callbacks on a dedicated thread.
///
/// The thread exits once the last clone of this context is dropped.
#[derive(Debug, Clone)]
pub struct ThreadDelivery {
    tx: UnboundedSender<Task>,
}

impl ThreadDelivery {
    /// Spawn the delivery thread.
    pub fn spawn(name: impl Into<String>) -> LoadResult<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let name = name.into();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
                debug!(thread = %name, "Delivery thread exiting");
            })
            .map_err(|e| LoadError::other(format!("failed to spawn delivery thread: {e}")))?;
        Ok(Self { tx })
    }
}

impl DeliveryContext for ThreadDelivery {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            trace!("Delivery thread gone; discarding posted callback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_main_loop_runs_in_order_on_owner() {
        let mut main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let poster = {
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for i in 0..5 {
                    let seen = Arc::clone(&seen);
                    handle.post(Box::new(move || {
                        seen.lock().unwrap().push((i, thread::current().id()));
                    }));
                }
            })
        };
        poster.join().unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(main_loop.run_pending(), 5);

        let owner = thread::current().id();
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert!(seen.iter().all(|(_, id)| *id == owner));
    }

    #[test]
    fn test_run_until_times_out() {
        let mut main_loop = MainLoop::new();
        assert!(!main_loop.run_until(Duration::from_millis(10), || false));
    }

    #[tokio::test]
    async fn test_tick_waits_for_work() {
        let mut main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.post(Box::new(move || *counter.lock().unwrap() += 1));
        });

        let ran = tokio::time::timeout(Duration::from_secs(5), main_loop.tick())
            .await
            .unwrap();
        assert_eq!(ran, 1);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_thread_delivery_runs_off_caller() {
        let delivery = ThreadDelivery::spawn("loadq-test-delivery").unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        delivery.post(Box::new(move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap();
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("loadq-test-delivery"));
    }
}

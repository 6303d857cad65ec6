//! Rate-limited progress for one transfer.

use std::time::{Duration, Instant};

/// Gate that opens at most once per interval, counted from its creation.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    last_emit: Instant,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: Instant::now(),
            min_interval,
        }
    }

    pub(crate) fn should_emit(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_emit) < self.min_interval {
            return false;
        }
        self.last_emit = now;
        true
    }
}

/// Running byte count of one transfer.
///
/// Intermediate updates are throttled and only produced when the total is
/// known. [`TransferProgress::finish`] always produces the final update,
/// once.
#[derive(Debug)]
pub struct TransferProgress {
    transferred: u64,
    total: Option<u64>,
    throttle: ProgressThrottle,
    finished: bool,
}

impl TransferProgress {
    pub fn new(total: Option<u64>, interval: Duration) -> Self {
        Self {
            transferred: 0,
            total,
            throttle: ProgressThrottle::new(interval),
            finished: false,
        }
    }

    pub const fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Record `n` more bytes. Returns `(transferred, total)` when an
    /// intermediate event is due.
    ///
    /// Reaching the total is left to [`TransferProgress::finish`].
    pub fn advance(&mut self, n: usize) -> Option<(u64, u64)> {
        self.transferred += n as u64;
        let total = self.total?;
        if self.transferred == total {
            return None;
        }
        self.throttle
            .should_emit()
            .then_some((self.transferred, total))
    }

    /// The final update, bypassing the throttle. `None` if already produced.
    ///
    /// An unknown total is reported as the transferred count.
    pub fn finish(&mut self) -> Option<(u64, u64)> {
        if std::mem::replace(&mut self.finished, true) {
            return None;
        }
        Some((self.transferred, self.total.unwrap_or(self.transferred)))
    }
}

//! # Time Source
//!
//! Abstracted so that freshness checks and timeouts can be tested with
//! deterministic time.

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Time source for consistent timestamp handling.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Manually driven time source for tests and simulations.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

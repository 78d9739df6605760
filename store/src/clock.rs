//! Time source for store-stamped timestamps.
//!
//! Every persisted write stamps `updated_at` from the handle's clock, so
//! tests can pin time by injecting a [`ManualClock`].

use crate::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A source of millisecond wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> Timestamp;
}

/// The system wall-clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis() as Timestamp
    }
}

/// A manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock pinned at the given millisecond timestamp.
    pub fn at(ms: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            ms: AtomicU64::new(ms),
        })
    }

    /// Pin the clock to a new timestamp.
    pub fn set(&self, ms: Timestamp) {
        self.ms.store(ms, Ordering::SeqCst);
    }

    /// Advance the clock by `delta` milliseconds.
    pub fn advance(&self, delta: Timestamp) {
        self.ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.ms.load(Ordering::SeqCst)
    }
}

//! Clock abstraction so fare and subscription windows can be tested deterministically.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use jiff::{SignedDuration, Timestamp};

/// Source of "now" for the ledger.
///
/// Production code uses [`SystemClock`]; tests and deterministic replays use
/// [`FixedClock`].
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock pinned to an explicit instant, advanced manually.
///
/// Clones share the same instant, so a test can keep a handle while the
/// ledger owns another.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<Timestamp>>,
}

impl FixedClock {
    /// Creates a clock pinned to `now`.
    pub fn at(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock forward (or backward) by `delta`.
    pub fn advance(&self, delta: SignedDuration) {
        let mut now = self.lock();
        *now = now
            .saturating_add(delta)
            .unwrap_or_else(|_| unreachable!("`SignedDuration` arithmetic cannot fail"));
    }

    /// Repins the clock to `now`.
    pub fn set(&self, now: Timestamp) {
        *self.lock() = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timestamp> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.lock()
    }
}

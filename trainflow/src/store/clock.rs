//! Clocks used to stamp versioned artifacts.

use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

/// Source of the local wall-clock time used in artifact names.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}

/// A manually driven clock.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl FixedClock {
    /// Creates a clock stopped at `at`.
    #[must_use]
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(at.trunc_subsecs(0))),
        }
    }

    /// Moves the clock to `at`.
    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock() = at.trunc_subsecs(0);
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

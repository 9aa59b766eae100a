//! Time sources.

use crate::stream::Timestamp;
use std::cell::Cell;

/// A monotonically non-decreasing source of the current time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// A clock that only moves when told to.
///
/// Uses interior mutability so the engine can own the clock while the caller
/// still advances it through [`StreamEngine::clock`](crate::StreamEngine::clock).
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        ManualClock {
            now: Cell::new(start),
        }
    }

    /// Moves the clock forward to `time`.
    ///
    /// Returns `false` and leaves the clock unchanged if `time` is in the past.
    pub fn advance_to(&self, time: Timestamp) -> bool {
        if time < self.now.get() {
            return false;
        }
        self.now.set(time);
        true
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

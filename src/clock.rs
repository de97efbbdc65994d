//! Time abstraction so services can be tested with a fixed clock.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Provides the current time.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    /// The time this clock always reports.
    pub time: DateTime<Utc>,
}

impl FixedClock {
    /// Creates a fixed clock at the given instant.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// Arc-wrapped convenience constructor.
    #[must_use]
    pub fn shared(time: DateTime<Utc>) -> Arc<dyn Clock> {
        Arc::new(Self::new(time))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

//! Wall-clock source for the lazy time-advancement engine.
//!
//! RULE: Nothing in the simulation reads the system time directly.
//! Every "now" flows through a Clock so tests and replays can pin it.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// The production clock: UTC wall time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { now: AtomicI64::new(start) }
    }

    pub fn set(&self, ts: Timestamp) {
        self.now.store(ts, Ordering::SeqCst);
    }

    /// Advance by `secs` seconds. Returns the new time.
    pub fn advance(&self, secs: i64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn advance_hours(&self, hours: i64) -> Timestamp {
        self.advance(hours * 3600)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

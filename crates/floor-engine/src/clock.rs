//! # Time Source
//!
//! Injectable "now" for finalization timestamps and for deciding which
//! reservations are already due.
//!
//! Two readings are needed: UTC for record timestamps, and the restaurant's
//! wall clock, because reservation dates and times are stored as local
//! values without an offset.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};

/// Supplies the current time.
pub trait Clock: Send + Sync {
    /// Current instant, for `created_at` / `finalized_at` columns.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current restaurant wall-clock time.
    fn now_local(&self) -> NaiveDateTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
///
/// The wall clock is the UTC reading shifted to naive time, which is enough
/// for tests that only compare the two against each other.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    /// A clock whose wall-clock reading is `local`.
    pub fn at(local: NaiveDateTime) -> Self {
        Self::new(local.and_utc())
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.lock() = to;
    }

    pub fn set_local(&self, to: NaiveDateTime) {
        self.set(to.and_utc());
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid instant.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn now_local(&self) -> NaiveDateTime {
        self.lock().naive_utc()
    }
}

//! Time Source Abstraction
//!
//! Expirations are computed against an injectable clock rather than the wall
//! clock directly. The store is the only component that reads time; it stamps
//! `created_at` on new items and evaluates TTLs on access.
//!
//! Two implementations are provided:
//!
//! - [`SystemClock`]: reads the system wall clock. This is what a server
//!   started with [`crate::MiniMemcached::run`] uses.
//! - [`MockClock`]: holds a cursor that starts at the current wall time and
//!   moves only when [`MockClock::advance`] is called. Inject it with
//!   [`crate::MiniMemcached::run_with_clock`] to test expiry behavior without
//!   sleeping.
//!
//! ## Example
//!
//! ```
//! use mini_memcached::clock::{Clock, MockClock};
//! use std::time::Duration;
//!
//! let clock = MockClock::new();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(60));
//! assert_eq!(clock.now(), before + 60);
//! ```

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time, as Unix seconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in seconds since the Unix epoch.
    fn now(&self) -> i64;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A manually advanced clock for tests.
///
/// The cursor is initialized to the current wall time and only moves when
/// [`advance`](MockClock::advance) is called. The cursor is mutex-guarded so
/// a test can advance time while server tasks read it.
#[derive(Debug)]
pub struct MockClock {
    cursor: Mutex<Duration>,
}

impl MockClock {
    /// Creates a mock clock positioned at the current wall time.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            cursor: Mutex::new(now),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut cursor = self.cursor.lock().unwrap();
        *cursor += delta;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> i64 {
        self.cursor.lock().unwrap().as_secs() as i64
    }
}

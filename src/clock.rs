//! Time source for the capture loop.
//!
//! The engine never calls `std::thread::sleep` or `Local::now` directly; it
//! goes through [`Clock`] so the whole daily lifecycle can be driven against
//! virtual time in tests.

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Longest single sleep; waits are sliced so a stop request is seen promptly.
pub const MAX_SLEEP_SLICE: Duration = Duration::from_secs(1);

pub trait Clock {
    /// Local wall-clock time.
    fn now(&self) -> DateTime<Local>;

    /// Monotonic time since an arbitrary origin.
    fn monotonic(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock: `sleep` returns immediately after advancing time.
///
/// Clones share the same timeline, so a capture test double can hold one
/// clone and charge processing time while the engine holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    start: DateTime<Local>,
    elapsed: Duration,
}

impl ManualClock {
    pub fn starting_at(start: DateTime<Local>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                start,
                elapsed: Duration::ZERO,
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.elapsed += duration;
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).elapsed
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Durations here never exceed a day, well inside chrono's range.
        let offset = chrono::Duration::from_std(state.elapsed).unwrap_or(chrono::Duration::zero());
        state.start + offset
    }

    fn monotonic(&self) -> Duration {
        self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Cooperative stop flag, set from the signal handler.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Sleeps for `total` in slices of at most [`MAX_SLEEP_SLICE`].
///
/// Returns `false` if a stop was requested before the full duration elapsed.
pub fn sleep_interruptible(clock: &dyn Clock, total: Duration, shutdown: &Shutdown) -> bool {
    let deadline = clock.monotonic() + total;
    loop {
        if shutdown.is_requested() {
            return false;
        }
        let now = clock.monotonic();
        if now >= deadline {
            return true;
        }
        clock.sleep((deadline - now).min(MAX_SLEEP_SLICE));
    }
}

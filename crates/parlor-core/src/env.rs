//! Clock abstraction for deterministic testing.
//!
//! Production code runs on [`SystemEnv`]; tests substitute a virtual clock so
//! time-dependent behavior (message timestamps, credential expiry) is
//! reproducible. Code in this crate never reads `std::time` directly.

use std::ops::Sub;
use std::time::Duration;

/// Clocks the chat core depends on.
///
/// Implementations are cheap to clone: the directory and every room actor
/// hold their own copy, and clones observe the same underlying clock.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant for elapsed-time measurements.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current monotonic time. Never decreases for a given environment.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time as whole seconds since the Unix epoch.
    ///
    /// Stamps messages and room creation, and anchors credential expiry
    /// checks.
    fn wall_clock_secs(&self) -> u64;
}

/// Production environment backed by the system clocks.
///
/// Uses `std::time::Instant::now()` for monotonic time and
/// `std::time::SystemTime::now()` for wall-clock time. Behavior is
/// non-deterministic; tests use the harness's virtual clock instead.
///
/// # Panics
///
/// `wall_clock_secs` panics if the system clock reports a time before the
/// Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }
}

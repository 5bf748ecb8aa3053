//! Virtual clock environment.
//!
//! Time moves only when a test calls [`SimEnv::advance`], so runs are
//! reproducible regardless of scheduling or host load.

use std::ops::Sub;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parlor_core::Environment;

/// Monotonic instant on the virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(Duration);

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Deterministic [`Environment`] over a virtual clock.
///
/// Clones share one clock, the way clones of the production environment
/// share the system clock: advancing any clone advances them all.
///
/// # Panics
///
/// Clock methods panic if the shared clock mutex was poisoned by a
/// panicking test thread.
#[derive(Debug, Clone)]
pub struct SimEnv {
    start_secs: u64,
    elapsed: Arc<Mutex<Duration>>,
}

impl SimEnv {
    /// Virtual clock whose wall time starts at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::with_start(0)
    }

    /// Virtual clock whose wall time starts at `start_secs`.
    #[must_use]
    pub fn with_start(start_secs: u64) -> Self {
        Self { start_secs, elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the clock. Affects every clone.
    #[allow(clippy::expect_used)]
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().expect("invariant: clock mutex not poisoned");
        *elapsed += by;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    #[allow(clippy::expect_used)]
    fn now(&self) -> SimInstant {
        SimInstant(*self.elapsed.lock().expect("invariant: clock mutex not poisoned"))
    }

    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        let elapsed = self.elapsed.lock().expect("invariant: clock mutex not poisoned");
        self.start_secs + elapsed.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_stands_still_until_advanced() {
        let env = SimEnv::with_start(1_000);
        assert_eq!(env.wall_clock_secs(), 1_000);
        assert_eq!(env.wall_clock_secs(), 1_000);

        env.advance(Duration::from_secs(5));
        assert_eq!(env.wall_clock_secs(), 1_005);
    }

    #[test]
    fn test_clones_share_the_clock() {
        let env = SimEnv::new();
        let clone = env.clone();
        clone.advance(Duration::from_secs(7));
        assert_eq!(env.wall_clock_secs(), 7);
        assert_eq!(env.now(), clone.now());
    }

    #[test]
    fn test_instants_order_and_subtract() {
        let env = SimEnv::new();
        let before = env.now();
        env.advance(Duration::from_millis(1_500));
        let after = env.now();
        assert!(after > before);
        assert_eq!(after - before, Duration::from_millis(1_500));
    }

    #[test]
    fn test_sub_second_advances_do_not_move_wall_seconds() {
        let env = SimEnv::with_start(100);
        env.advance(Duration::from_millis(900));
        assert_eq!(env.wall_clock_secs(), 100);
        env.advance(Duration::from_millis(100));
        assert_eq!(env.wall_clock_secs(), 101);
    }
}

//! Monotonic per-shell timeout tracking.

use std::time::{Duration, Instant};

/// Default per-shell timeout when no `[timeout N]` directive overrides it.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// A restartable countdown armed from a monotonic clock.
///
/// `restart()` captures "now", and `get_ms_until_timeout()` is
/// non-increasing between restarts, reaching zero exactly when the
/// deadline has passed.
#[derive(Debug, Clone)]
pub struct Timeout {
    start: Instant,
    timeout: Duration,
}

impl Timeout {
    /// Creates a new timeout of `timeout_ms` milliseconds, armed immediately.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            start: Instant::now(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Resets the countdown's start point to now.
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    /// Changes the timeout duration without touching the start point.
    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout = Duration::from_millis(timeout_ms);
    }

    /// Milliseconds remaining before this timeout expires, saturating at
    /// zero.
    pub fn get_ms_until_timeout(&self) -> u64 {
        let elapsed = self.start.elapsed();
        self.timeout.checked_sub(elapsed).map_or(0, |remaining| {
            #[expect(clippy::cast_possible_truncation)]
            let ms = remaining.as_millis() as u64;
            ms
        })
    }

    /// Whether the deadline has already passed.
    pub fn has_expired(&self) -> bool {
        self.get_ms_until_timeout() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_timeout_has_not_expired() {
        let t = Timeout::new(10_000);
        assert!(!t.has_expired());
        assert!(t.get_ms_until_timeout() > 0);
    }

    #[test]
    fn zero_timeout_is_immediately_expired() {
        let t = Timeout::new(0);
        assert!(t.has_expired());
        assert_eq!(t.get_ms_until_timeout(), 0);
    }

    #[test]
    fn restart_resets_the_deadline() {
        let mut t = Timeout::new(0);
        assert!(t.has_expired());
        t.set_timeout_ms(10_000);
        t.restart();
        assert!(!t.has_expired());
    }

    #[test]
    fn remaining_time_is_monotonically_non_increasing() {
        let t = Timeout::new(10_000);
        let first = t.get_ms_until_timeout();
        std::thread::sleep(Duration::from_millis(5));
        let second = t.get_ms_until_timeout();
        assert!(second <= first);
    }
}

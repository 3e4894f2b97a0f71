#![forbid(unsafe_code)]

//! Wall-clock time sources.
//!
//! Every timestamp in the widget is epoch milliseconds, matching what the
//! browser's `Date.now()` returns and what ends up in session storage. The
//! host owns the clock; tests drive a [`ManualClock`] explicitly.

use core::time::Duration;

/// Source of "now" in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// System wall clock.
///
/// Backed by `web-time`, which maps to `Date.now()` on `wasm32` and to
/// `std::time::SystemTime` elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        web_time::SystemTime::now()
            .duration_since(web_time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Deterministic clock controlled by the caller.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: u64,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`.
    #[must_use]
    pub const fn starting_at(start_ms: u64) -> Self {
        Self { now_ms: start_ms }
    }

    /// Set the current time.
    pub fn set(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    /// Advance by `dt`, saturating at `u64::MAX`.
    pub fn advance(&mut self, dt: Duration) {
        let dt_ms = u64::try_from(dt.as_millis()).unwrap_or(u64::MAX);
        self.now_ms = self.now_ms.saturating_add(dt_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_saturates() {
        let mut clock = ManualClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(Duration::from_millis(70));
        assert_eq!(clock.now_ms(), 1_070);

        clock.set(u64::MAX - 1);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_ms(), u64::MAX);
    }

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}

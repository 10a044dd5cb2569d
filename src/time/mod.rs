//! Monotonic millisecond clock
//!
//! Reaction times are measured on a free-running 32-bit millisecond counter,
//! the same shape as the tick counter of a microcontroller. The counter wraps
//! roughly every 49.7 days, so two readings must only ever be compared with
//! [`Ticks::diff`], which stays correct across a rollover.
//!
//! # Examples
//!
//! ```
//! use reactz::time::Ticks;
//!
//! let start = Ticks::new(u32::MAX - 100);
//! let end = start.add_ms(312);
//! assert_eq!(end.get(), 211);
//! assert_eq!(end.diff(start), 312);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Reading of a wrapping millisecond counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticks(u32);

impl Ticks {
    pub const fn new(raw: u32) -> Self {
        Ticks(raw)
    }

    /// Raw counter value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Advances the reading, wrapping at the counter width
    pub const fn add_ms(self, ms: u32) -> Self {
        Ticks(self.0.wrapping_add(ms))
    }

    /// Signed distance `self - earlier` in milliseconds
    ///
    /// Correct as long as the two readings are less than half the counter
    /// period apart. A negative value means `self` precedes `earlier`.
    pub const fn diff(self, earlier: Ticks) -> i32 {
        self.0.wrapping_sub(earlier.0) as i32
    }

    /// Milliseconds elapsed since `earlier`, clamped at zero
    pub fn elapsed_since(self, earlier: Ticks) -> u32 {
        u32::try_from(self.diff(earlier)).unwrap_or(0)
    }
}

/// Source of monotonic millisecond readings
pub trait Clock: Send + Sync {
    fn now(&self) -> Ticks;
}

/// Clock backed by the tokio time driver
///
/// Follows tokio's paused clock in tests, so timing scenarios are exact.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
    offset: u32,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Starts the counter at `offset` instead of zero
    pub fn with_offset(offset: u32) -> Self {
        MonotonicClock {
            origin: tokio::time::Instant::now(),
            offset,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Ticks {
        // Truncation to the counter width is the wrap
        let ms = self.origin.elapsed().as_millis() as u32;
        Ticks(self.offset).add_ms(ms)
    }
}

/// Hand-driven clock for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    raw: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(start: Ticks) -> Self {
        ManualClock {
            raw: Arc::new(AtomicU32::new(start.get())),
        }
    }

    pub fn advance(&self, ms: u32) {
        let _ = self
            .raw
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| Some(raw.wrapping_add(ms)));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        Ticks(self.raw.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_diff_without_wrap() {
        assert_eq!(Ticks::new(1280).diff(Ticks::new(1000)), 280);
        assert_eq!(Ticks::new(1000).diff(Ticks::new(1280)), -280);
    }

    #[test]
    fn test_diff_across_rollover() {
        let start = Ticks::new(u32::MAX - 9);
        let end = Ticks::new(270);
        // Naive subtraction would underflow here
        assert_eq!(end.diff(start), 280);
        assert_eq!(end.elapsed_since(start), 280);
    }

    #[test]
    fn test_elapsed_clamps_negative() {
        assert_eq!(Ticks::new(5).elapsed_since(Ticks::new(10)), 0);
    }

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::new(Ticks::new(u32::MAX));
        clock.advance(2);
        assert_eq!(clock.now(), Ticks::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_tokio_time() {
        let clock = MonotonicClock::with_offset(u32::MAX - 50);
        let start = clock.now();
        tokio::time::sleep(Duration::from_millis(312)).await;
        let end = clock.now();

        assert!(end.get() < start.get(), "counter should have wrapped");
        assert_eq!(end.diff(start), 312);
    }

    proptest! {
        #[test]
        fn prop_diff_inverts_add(start in any::<u32>(), ms in 0u32..=i32::MAX as u32) {
            let start = Ticks::new(start);
            prop_assert_eq!(start.add_ms(ms).diff(start), ms as i32);
        }
    }
}

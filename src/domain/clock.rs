//! Time source for entry timestamps and expiry checks

use std::fmt::Debug;

/// Millisecond wall clock
pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::Clock;

    /// Clock that only moves when told to
    #[derive(Debug)]
    pub struct ManualClock {
        now: AtomicU64,
    }

    impl ManualClock {
        pub fn new(start_millis: u64) -> Self {
            Self {
                now: AtomicU64::new(start_millis),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(1_700_000_000_000)
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ManualClock;
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_millis(), 3_000);
    }
}

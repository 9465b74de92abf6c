//! Time sources and the periodic tick driver.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::sync::Arc;

/// Clock consulted by the Clock and Log processes.
pub trait TimeSource: fmt::Debug + Send + Sync {
    /// Time elapsed since the source was created.
    fn monotonic(&self) -> Duration;

    /// Wall-clock time since the Unix epoch.
    fn unix_time(&self) -> Duration;
}

pub type SharedTimeSource = Arc<dyn TimeSource>;

/// Real time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn monotonic(&self) -> Duration {
        self.start.elapsed()
    }

    fn unix_time(&self) -> Duration {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
    }
}

/// Simulated time, moved forward explicitly.
///
/// Cloning yields a handle to the same clock.
#[derive(Debug, Clone)]
pub struct ManualClock {
    elapsed_ns: Arc<AtomicU64>,
    epoch: Duration,
}

impl ManualClock {
    /// Unix time reported when no time has elapsed.
    pub const DEFAULT_EPOCH: Duration = Duration::from_secs(1_700_000_000);

    pub fn new() -> Self {
        Self::starting_at(Self::DEFAULT_EPOCH)
    }

    pub fn starting_at(epoch: Duration) -> Self {
        Self {
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_ns.fetch_add(saturating_nanos(by), Ordering::AcqRel);
    }

    pub fn set(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn monotonic(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }

    fn unix_time(&self) -> Duration {
        self.epoch + self.monotonic()
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Drift-correcting periodic driver.
///
/// Each [`wait`](Self::wait) sleeps for whatever is left of the period since
/// the previous call, or not at all if the work in between overran it.
#[derive(Debug)]
pub struct Cyclic {
    period: Duration,
    last: Instant,
}

impl Cyclic {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Instant::now(),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.last.elapsed())
    }

    pub fn wait(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
        self.last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        assert_eq!(clock.monotonic(), Duration::ZERO);

        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.monotonic(), Duration::from_millis(250));
        assert_eq!(clock.unix_time(), ManualClock::DEFAULT_EPOCH + Duration::from_millis(250));

        clock.set(Duration::from_secs(3));
        assert_eq!(handle.monotonic(), Duration::from_secs(3));
    }

    #[test]
    fn cyclic_sleeps_out_the_rest_of_the_period() {
        let mut cyclic = Cyclic::new(Duration::from_millis(20));
        let start = Instant::now();
        cyclic.wait();
        cyclic.wait();
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn overrun_period_does_not_sleep() {
        let mut cyclic = Cyclic::new(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        assert_eq!(cyclic.remaining(), Duration::ZERO);
        let start = Instant::now();
        cyclic.wait();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}

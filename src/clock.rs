//! # Pluggable time source.
//!
//! Every due-time computation in the crate goes through a [`Clock`], which is
//! the seam that makes the delay-queue deterministic under test: a simulated
//! clock can be driven tick-by-tick to trigger releases exactly on cue.
//!
//! ## Variants
//! - [`Clock::real`] — tracks wall-clock time directly.
//! - [`Clock::offset`] — an anchor is captured on first use; subsequent reads
//!   return `start + elapsed-since-anchor`, so a run behaves "as of" another
//!   time-of-day while still advancing in real time.
//! - [`Clock::simulated`] — time is a settable value, advanced only by
//!   [`tick`](Clock::tick) / [`set`](Clock::set); it never moves otherwise.
//!
//! ## Rules
//! - `tick` / `set` are no-ops under the real-time variants.
//! - [`wait_until`](Clock::wait_until) suspends until the clock reaches a
//!   deadline: real variants sleep the remaining wall duration, the simulated
//!   variant parks until a tick moves time to/past the deadline.
//! - One clock instance is shared (`Arc<Clock>`) between a producer and
//!   whoever drives time; all methods take `&self`.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// A time source with explicit variants instead of subclassing.
///
/// Stored behind `Arc` and shared between the component that reads time and
/// the driver that advances it (tests, simulation harnesses).
#[derive(Debug)]
pub enum Clock {
    /// Wall-clock time.
    Real,
    /// Wall-clock cadence anchored to a configured start instant.
    OffsetReal {
        /// Millis since the epoch that `now()` reports at the anchor.
        start_ms: u64,
        /// Captured on first read; elapsed time since it is added to `start_ms`.
        anchor: OnceLock<Instant>,
    },
    /// Manually advanced time.
    Simulated {
        /// Current simulated time as millis since the epoch.
        now_ms: AtomicU64,
        /// Woken whenever the simulated time moves.
        advanced: Notify,
    },
}

impl Clock {
    /// Creates a wall-clock time source.
    pub fn real() -> Self {
        Clock::Real
    }

    /// Creates an offset-anchored real-time source.
    ///
    /// The first call to [`now`](Clock::now) (or any read) captures the
    /// anchor; reads then return `start + elapsed-since-anchor`.
    pub fn offset(start: SystemTime) -> Self {
        Clock::OffsetReal {
            start_ms: to_millis(start),
            anchor: OnceLock::new(),
        }
    }

    /// Creates a simulated time source positioned at `start`.
    pub fn simulated(start: SystemTime) -> Self {
        Clock::Simulated {
            now_ms: AtomicU64::new(to_millis(start)),
            advanced: Notify::new(),
        }
    }

    /// Returns the current time according to this source.
    pub fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.now_millis())
    }

    /// Returns the current time as milliseconds since the epoch.
    pub fn now_millis(&self) -> u64 {
        match self {
            Clock::Real => to_millis(SystemTime::now()),
            Clock::OffsetReal { start_ms, anchor } => {
                let anchor = anchor.get_or_init(Instant::now);
                start_ms + anchor.elapsed().as_millis() as u64
            }
            Clock::Simulated { now_ms, .. } => now_ms.load(AtomicOrdering::Acquire),
        }
    }

    /// Advances simulated time by `duration`. No-op for real-time variants.
    pub fn tick(&self, duration: Duration) {
        if let Clock::Simulated { now_ms, advanced } = self {
            now_ms.fetch_add(duration.as_millis() as u64, AtomicOrdering::AcqRel);
            advanced.notify_waiters();
        }
    }

    /// Moves simulated time to `to`. No-op for real-time variants.
    ///
    /// Setting the clock backwards is not supported; callers drive time
    /// monotonically.
    pub fn set(&self, to: SystemTime) {
        if let Clock::Simulated { now_ms, advanced } = self {
            now_ms.store(to_millis(to), AtomicOrdering::Release);
            advanced.notify_waiters();
        }
    }

    /// Suspends until this clock reaches `deadline`.
    ///
    /// Returns immediately if the deadline has already passed. Under the
    /// simulated variant the wait completes only when [`tick`](Clock::tick)
    /// or [`set`](Clock::set) moves time to/past the deadline.
    pub async fn wait_until(&self, deadline: SystemTime) {
        match self {
            Clock::Real | Clock::OffsetReal { .. } => loop {
                let remaining = match deadline.duration_since(self.now()) {
                    Ok(d) if !d.is_zero() => d,
                    _ => return,
                };
                time::sleep(remaining).await;
            },
            Clock::Simulated { advanced, .. } => loop {
                // Register before re-checking so a concurrent tick is not lost.
                let mut armed = std::pin::pin!(advanced.notified());
                armed.as_mut().enable();
                if self.now() >= deadline {
                    return;
                }
                armed.await;
            },
        }
    }
}

fn to_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn base() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_simulated_holds_until_advanced() {
        let clock = Clock::simulated(base());
        assert_eq!(clock.now(), base());
        assert_eq!(clock.now(), base());

        clock.tick(Duration::from_secs(3));
        assert_eq!(clock.now(), base() + Duration::from_secs(3));

        clock.set(base() + Duration::from_secs(10));
        assert_eq!(clock.now(), base() + Duration::from_secs(10));
    }

    #[test]
    fn test_tick_is_noop_for_real_variants() {
        let clock = Clock::real();
        let before = clock.now_millis();
        clock.tick(Duration::from_secs(3600));
        clock.set(UNIX_EPOCH);
        assert!(clock.now_millis() >= before);
        // A real clock never jumps an hour forward from a tick.
        assert!(clock.now_millis() < before + 3_600_000);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_offset_clock_advances_from_start() {
        let clock = Clock::offset(base());
        assert_eq!(clock.now(), base());

        time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.now(), base() + Duration::from_secs(5));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_wait_until_simulated_releases_on_tick() {
        let clock = Arc::new(Clock::simulated(base()));
        let deadline = base() + Duration::from_secs(9);

        let waiter = {
            let clock = Arc::clone(&clock);
            tokio::spawn(async move { clock.wait_until(deadline).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        clock.tick(Duration::from_secs(4));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        clock.tick(Duration::from_secs(5));
        let joined = time::timeout(Duration::from_secs(1), waiter).await;
        assert!(joined.is_ok(), "waiter did not release at the deadline");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_wait_until_past_deadline_returns_immediately() {
        let clock = Clock::simulated(base());
        clock.wait_until(base()).await;
        clock.wait_until(base() - Duration::from_secs(1)).await;

        let real = Clock::real();
        real.wait_until(UNIX_EPOCH).await;
    }
}

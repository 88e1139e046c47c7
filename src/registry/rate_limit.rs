//! Request pacing for the registry API
//!
//! Every caller reserves the next free start slot under the lock and sleeps
//! outside it, so concurrent lookups are spaced evenly instead of bursting.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until this caller's slot comes up
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = self.reserve(Instant::now());
        sleep_until(slot).await;
    }

    fn reserve(&self, now: Instant) -> Instant {
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.interval);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_evenly_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let now = Instant::now();
        let a = pacer.reserve(now);
        let b = pacer.reserve(now);
        let c = pacer.reserve(now);
        assert_eq!(a, now);
        assert_eq!(b - a, Duration::from_millis(500));
        assert_eq!(c - b, Duration::from_millis(500));
    }

    #[test]
    fn test_idle_pacer_starts_immediately() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.reserve(start);
        let later = start + Duration::from_secs(5);
        assert_eq!(pacer.reserve(later), later);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_reserved_slot() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let pacer = RequestPacer::new(Duration::ZERO);
        for _ in 0..100 {
            pacer.wait().await;
        }
        assert_eq!(pacer.interval(), Duration::ZERO);
    }
}

use std::time::{Duration, Instant};

/// Residual waits shorter than this are spun instead of slept; OS sleeps
/// routinely overshoot by about this much.
pub const SPIN_THRESHOLD: Duration = Duration::from_micros(50);

/// Fixed inter-arrival schedule for one worker.
///
/// The deadline advances by exactly `interval` per invocation no matter how
/// long the invocation took, so a slow call is followed by back-to-back
/// calls until the schedule is caught up.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next: start,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Block until the next slot or `limit`, whichever comes first.
    /// Returns `false` when `limit` cut the wait short, or when `stop` asked
    /// to stop while waiting.
    pub fn wait(&self, limit: Option<Instant>, stop: impl Fn() -> bool) -> bool {
        let target = match limit {
            Some(limit) if limit < self.next => limit,
            _ => self.next,
        };
        let reached = wait_until(target, stop);
        reached && target == self.next
    }

    /// Move the deadline one interval forward.
    pub fn advance(&mut self) {
        self.next += self.interval;
    }
}

/// Sleep for the coarse part of the wait, spin for the residual.
/// Long sleeps are chunked so `stop` is observed at least once per
/// `CHECK_EVERY`. Returns `false` if `stop` fired.
pub fn wait_until(deadline: Instant, stop: impl Fn() -> bool) -> bool {
    const CHECK_EVERY: Duration = Duration::from_millis(10);

    loop {
        if stop() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            std::thread::sleep((remaining - SPIN_THRESHOLD).min(CHECK_EVERY));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_exact_interval() {
        let start = Instant::now();
        let mut pacer = Pacer::new(Duration::from_micros(100), start);
        for _ in 0..10 {
            pacer.advance();
        }
        assert_eq!(pacer.next_deadline() - start, Duration::from_millis(1));
    }

    #[test]
    fn wait_returns_immediately_when_behind() {
        let start = Instant::now() - Duration::from_millis(5);
        let pacer = Pacer::new(Duration::from_millis(1), start);
        let t0 = Instant::now();
        assert!(pacer.wait(None, || false));
        assert!(t0.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn wait_reaches_deadline() {
        let start = Instant::now() + Duration::from_millis(3);
        let pacer = Pacer::new(Duration::from_millis(1), start);
        assert!(pacer.wait(None, || false));
        assert!(Instant::now() >= start);
    }

    #[test]
    fn wait_is_capped_by_limit() {
        let now = Instant::now();
        let pacer = Pacer::new(Duration::from_secs(1), now + Duration::from_secs(10));
        let limit = now + Duration::from_millis(2);
        assert!(!pacer.wait(Some(limit), || false));
        assert!(now.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_observes_stop() {
        let now = Instant::now();
        let pacer = Pacer::new(Duration::from_secs(1), now + Duration::from_secs(10));
        assert!(!pacer.wait(None, || true));
        assert!(now.elapsed() < Duration::from_secs(1));
    }
}

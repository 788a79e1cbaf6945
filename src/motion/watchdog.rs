// Command watchdog
//
// A liveness timer: the command stream resets it, the control loop reads it.
// Uses tokio's monotonic Instant so wall-clock adjustments never trigger it
// (and so paused-time tests can drive it).

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_reset: Instant,
}

impl Watchdog {
    /// Create a watchdog that starts live, as if just reset
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_reset: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.last_reset = Instant::now();
    }

    /// True iff the time since the last reset strictly exceeds the timeout
    pub fn is_timed_out(&self) -> bool {
        self.elapsed() > self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.last_reset.elapsed()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_starts_live() {
        let watchdog = Watchdog::new(Duration::from_millis(50));
        assert!(!watchdog.is_timed_out());
        assert!(watchdog.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_reset_round_trip() {
        let mut watchdog = Watchdog::new(Duration::from_millis(20));
        watchdog.reset();
        assert!(!watchdog.is_timed_out());

        sleep(Duration::from_millis(40));
        assert!(watchdog.is_timed_out(), "should time out after timeout + eps");

        // Timeout is recoverable, not a one-shot lockout
        watchdog.reset();
        assert!(!watchdog.is_timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_is_strict() {
        let watchdog = Watchdog::new(Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!watchdog.is_timed_out(), "exactly at timeout is still live");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(watchdog.is_timed_out());
    }
}

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source for the sampling loop.
///
/// `advance` moves the clock forward by one sampling interval and returns how
/// long the caller should actually wait before sampling again.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
    fn advance(&self, interval: Duration) -> Duration;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn advance(&self, interval: Duration) -> Duration {
        interval
    }
}

/// Clock that only moves when told to; used for replayed feeds and tests.
pub struct SimulatedClock {
    t: Mutex<f64>,
}

impl SimulatedClock {
    pub fn new(start: f64) -> Self {
        Self { t: Mutex::new(start) }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> f64 {
        *self.t.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn advance(&self, interval: Duration) -> Duration {
        let mut t = self.t.lock().unwrap_or_else(|e| e.into_inner());
        *t += interval.as_secs_f64();
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_clock_moves_only_on_advance() {
        let clock = SimulatedClock::new(100.0);
        assert_eq!(clock.now(), 100.0);
        let wait = clock.advance(Duration::from_millis(1500));
        assert_eq!(wait, Duration::ZERO);
        assert_eq!(clock.now(), 101.5);
    }

    #[test]
    fn system_clock_waits_full_interval() {
        let clock = SystemClock;
        assert_eq!(clock.advance(Duration::from_secs(1)), Duration::from_secs(1));
        assert!(clock.now() > 0.0);
    }
}

use serde::Serialize;

use super::log::{delta_to_speed, SampleLog};

/// Relative weights of the last six one-interval speeds, newest first.
const CURVE_WEIGHTS: [u32; 6] = [6, 5, 4, 3, 2, 1];

/// Intervals used to extrapolate the completion estimate.
const SAMPLES_FOR_ESTIMATE: usize = 4;

/// Rate figures for a single feed, optionally tracking progress towards an
/// expected size.
#[derive(Clone, Debug)]
pub struct RateEstimator {
    log: SampleLog,
    expected_size: Option<u64>,
    current_size: Option<u64>,
}

/// Progress of a bounded transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: Option<u64>,
    pub expected: u64,
}

impl Progress {
    /// Completion fraction clamped to `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        let current = self.current.unwrap_or(0) as f64;
        if self.expected == 0 {
            return 1.0;
        }
        (current / self.expected as f64).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.current.map_or(false, |c| c >= self.expected)
    }
}

impl RateEstimator {
    pub fn new(maxlog: usize) -> Self {
        Self {
            log: SampleLog::new(maxlog),
            expected_size: None,
            current_size: None,
        }
    }

    pub fn with_expected_size(maxlog: usize, expected_size: u64) -> Self {
        assert!(
            maxlog >= SAMPLES_FOR_ESTIMATE,
            "completion estimate needs a log of at least {SAMPLES_FOR_ESTIMATE} readings"
        );
        Self {
            expected_size: Some(expected_size),
            ..Self::new(maxlog)
        }
    }

    pub fn log(&self) -> &SampleLog {
        &self.log
    }

    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    pub fn update(&mut self, at: f64, value: u64) {
        self.current_size = Some(value);
        self.log.update(at, value);
    }

    /// Speed over the most recent interval.
    pub fn current_speed(&self) -> Option<i64> {
        self.log.speed(1, 0)
    }

    /// Speed since the first reading.
    pub fn average_speed(&self) -> Option<i64> {
        self.log.speed(0, 0)
    }

    /// Weighted speed over the last six intervals, newest weighted highest.
    ///
    /// Uses as many intervals as the log holds, so it is 0 until two
    /// readings exist.
    pub fn curve(&self) -> i64 {
        let mut weight_total = 0u32;
        let mut weighted = 0.0f64;
        if self.log.maxlog() == 0 {
            return 0;
        }
        for (skip, &weight) in CURVE_WEIGHTS.iter().enumerate() {
            let Some((elapsed, bytes)) = self.log.delta(1, skip) else {
                break;
            };
            if elapsed <= 0.0 {
                break;
            }
            weight_total += weight;
            weighted += bytes as f64 * weight as f64 / elapsed;
        }
        delta_to_speed(weight_total as f64, weighted)
    }

    /// Current and expected size; `None` for unbounded feeds.
    pub fn progress(&self) -> Option<Progress> {
        self.expected_size.map(|expected| Progress {
            current: self.current_size,
            expected,
        })
    }

    /// Estimated seconds until the expected size is reached.
    ///
    /// `None` while there is too little history or the transfer is stalled,
    /// `Some(0.0)` once the expected size has been reached.
    pub fn completion_estimate(&self) -> Option<f64> {
        let expected = self.expected_size?;
        let (seconds, bytes) = self.log.delta(SAMPLES_FOR_ESTIMATE, 0)?;
        if bytes <= 0 {
            return None;
        }
        let remaining = expected as i64 - self.current_size.unwrap_or(0) as i64;
        if remaining <= 0 {
            return Some(0.0);
        }
        Some(remaining as f64 * seconds / bytes as f64)
    }
}

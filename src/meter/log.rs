use std::collections::VecDeque;

/// A timestamped byte-count sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reading {
    pub at: f64,
    pub value: u64,
}

/// Bounded rolling history of readings for one feed.
///
/// Holds at most `maxlog + 1` recent readings, plus the first reading ever
/// recorded which serves as the baseline for the average since start.
#[derive(Clone, Debug)]
pub struct SampleLog {
    log: VecDeque<Reading>,
    start: Option<Reading>,
    maxlog: usize,
}

impl SampleLog {
    pub fn new(maxlog: usize) -> Self {
        Self {
            log: VecDeque::with_capacity(maxlog + 1),
            start: None,
            maxlog,
        }
    }

    pub fn maxlog(&self) -> usize {
        self.maxlog
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn start(&self) -> Option<Reading> {
        self.start
    }

    pub fn latest(&self) -> Option<Reading> {
        self.log.back().copied()
    }

    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.log.iter()
    }

    pub fn update(&mut self, at: f64, value: u64) {
        let reading = Reading { at, value };
        if self.start.is_none() {
            self.start = Some(reading);
        }
        self.log.push_back(reading);
        while self.log.len() > self.maxlog + 1 {
            self.log.pop_front();
        }
    }

    /// Elapsed seconds and byte increase between two readings.
    ///
    /// `readings` counts intervals back from the current reading, 0 meaning
    /// "since start". The `skip` most recent readings are ignored. Returns
    /// `None` when the log does not reach that far yet or when the window is
    /// empty. The byte delta is negative if the counter went backwards.
    ///
    /// # Panics
    ///
    /// If `readings > maxlog`, or if `skip > 0` while `readings == 0`.
    pub fn delta(&self, readings: usize, skip: usize) -> Option<(f64, i64)> {
        assert!(
            readings <= self.maxlog,
            "log of {} readings can't measure {readings} intervals back",
            self.maxlog
        );
        assert!(skip == 0 || readings > 0, "can't skip when measuring since start");

        if skip >= self.log.len() {
            return None;
        }
        let current = self.log[self.log.len() - 1 - skip];

        let target = if readings == 0 {
            self.start?
        } else if self.log.len() > readings + skip {
            self.log[self.log.len() - 1 - readings - skip]
        } else {
            return None;
        };

        if target == current {
            return None;
        }
        let byte_increase = current.value as i64 - target.value as i64;
        let time_passed = current.at - target.at;
        Some((time_passed, byte_increase))
    }

    pub fn speed(&self, readings: usize, skip: usize) -> Option<i64> {
        self.delta(readings, skip)
            .map(|(elapsed, bytes)| delta_to_speed(elapsed, bytes as f64))
    }
}

/// Bytes per second from an elapsed time and a byte increase.
///
/// Both values are truncated to millisecond resolution before dividing, so
/// the result is a whole number and sub-millisecond windows yield 0.
pub fn delta_to_speed(elapsed: f64, bytes: f64) -> i64 {
    if elapsed <= 0.0 {
        return 0;
    }
    let millis = (elapsed * 1000.0) as i64;
    if millis == 0 {
        return 0;
    }
    (bytes * 1000.0) as i64 / millis
}

//! The sampling loop: polls every tap once per interval and feeds the
//! estimators, chart series and the render target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::chart::{ScaleModel, SeriesBuffer};
use crate::clock::Clock;
use crate::meter::{Progress, RateEstimator, DEFAULT_MAXLOG};
use crate::tap::Tap;

/// One tap with its rate history.
pub struct TapMonitor {
    tap: Tap,
    estimator: RateEstimator,
    series: SeriesBuffer,
}

impl TapMonitor {
    pub fn new(tap: Tap) -> Self {
        let estimator = match tap.expected_size() {
            Some(size) => RateEstimator::with_expected_size(DEFAULT_MAXLOG, size),
            None => RateEstimator::new(DEFAULT_MAXLOG),
        };
        Self {
            tap,
            estimator,
            series: SeriesBuffer::default(),
        }
    }

    pub fn description(&self) -> &str {
        self.tap.description()
    }

    pub fn estimator(&self) -> &RateEstimator {
        &self.estimator
    }

    pub fn series(&self) -> &SeriesBuffer {
        &self.series
    }

    pub fn report(&self) -> TapReport {
        let latest = self.estimator.log().latest();
        TapReport {
            description: self.tap.description().to_string(),
            at: latest.map(|r| r.at),
            bytes: latest.map(|r| r.value),
            current: self.estimator.current_speed(),
            curve: self.estimator.curve(),
            average: self.estimator.average_speed(),
            progress: self.estimator.progress(),
            eta: self.estimator.completion_estimate(),
        }
    }
}

/// Latest figures for one tap, as handed to render targets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TapReport {
    pub description: String,
    pub at: Option<f64>,
    pub bytes: Option<u64>,
    pub current: Option<i64>,
    pub curve: i64,
    pub average: Option<i64>,
    pub progress: Option<Progress>,
    pub eta: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Every tap produced a reading; `pending` bounded taps are incomplete.
    Sampled { pending: usize },
    /// A tap reached the end of its data.
    EndOfData,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    EndOfData,
    Complete,
    Cancelled,
}

pub struct Monitor {
    taps: Vec<TapMonitor>,
    scale: ScaleModel,
    clock: Arc<dyn Clock>,
    ticks: u64,
}

impl Monitor {
    pub fn new(taps: Vec<Tap>, scale: ScaleModel, clock: Arc<dyn Clock>) -> Self {
        Self {
            taps: taps.into_iter().map(TapMonitor::new).collect(),
            scale,
            clock,
            ticks: 0,
        }
    }

    pub fn taps(&self) -> &[TapMonitor] {
        &self.taps
    }

    pub fn scale(&self) -> &ScaleModel {
        &self.scale
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Completed sampling ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn has_bounded_taps(&self) -> bool {
        self.taps.iter().any(|t| t.estimator.expected_size().is_some())
    }

    pub fn reports(&self) -> Vec<TapReport> {
        self.taps.iter().map(TapMonitor::report).collect()
    }

    /// Poll every tap once, in order, stamping all readings with the same
    /// time. Nothing is recorded for a tick in which any tap ended.
    pub fn sample(&mut self) -> Tick {
        let now = self.clock.now();
        let values: Vec<Option<u64>> = self.taps.iter_mut().map(|t| t.tap.sample()).collect();
        if let Some(ended) = values.iter().position(Option::is_none) {
            info!(tap = %self.taps[ended].tap.description(), "End of data");
            return Tick::EndOfData;
        }

        let mut pending = 0;
        for (t, value) in self.taps.iter_mut().zip(values.into_iter().flatten()) {
            t.estimator.update(now, value);
            t.series.append(t.estimator.current_speed(), &self.scale);
            if t.estimator.progress().map_or(false, |p| !p.is_complete()) {
                pending += 1;
            }
        }
        self.ticks += 1;
        Tick::Sampled { pending }
    }
}

/// Where sampled figures end up.
pub trait RenderTarget {
    fn render(&mut self, monitor: &Monitor) -> Result<()>;

    /// Wait up to `wait` before the next tick. Returns false if the user
    /// asked to quit.
    fn wait(&mut self, wait: Duration) -> Result<bool>;
}

#[derive(Copy, Clone, Debug)]
pub struct RunOptions {
    pub interval: Duration,
    pub initial_delay: Duration,
    pub exit_on_complete: bool,
}

/// Drive `monitor` until data ends, bounded taps complete (when asked to
/// exit on completion), or the user quits through `target` or `stop`.
pub fn run(
    monitor: &mut Monitor,
    target: &mut dyn RenderTarget,
    options: RunOptions,
    stop: &AtomicBool,
) -> Result<Outcome> {
    let exit_when_done = options.exit_on_complete && monitor.has_bounded_taps();
    let mut delay = options.initial_delay;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(Outcome::Cancelled);
        }
        let pending = match monitor.sample() {
            Tick::EndOfData => return Ok(Outcome::EndOfData),
            Tick::Sampled { pending } => pending,
        };
        target.render(monitor)?;
        if exit_when_done && pending == 0 {
            debug!(ticks = monitor.ticks(), "All bounded taps complete");
            return Ok(Outcome::Complete);
        }

        let wait = monitor.clock().advance(delay);
        if !target.wait(wait)? {
            return Ok(Outcome::Cancelled);
        }
        delay = options.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ScaleConfig;
    use crate::clock::SimulatedClock;
    use crate::feed::ReplayFeed;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Vec<TapReport>>,
        quit_after: Option<usize>,
    }

    impl RenderTarget for Recorder {
        fn render(&mut self, monitor: &Monitor) -> Result<()> {
            self.frames.push(monitor.reports());
            Ok(())
        }

        fn wait(&mut self, _wait: Duration) -> Result<bool> {
            Ok(self.quit_after.map_or(true, |n| self.frames.len() < n))
        }
    }

    fn options(exit_on_complete: bool) -> RunOptions {
        RunOptions {
            interval: Duration::from_secs(1),
            initial_delay: Duration::from_secs(1),
            exit_on_complete,
        }
    }

    fn monitor(taps: Vec<Tap>) -> Monitor {
        let clock: Arc<dyn Clock> = Arc::new(SimulatedClock::new(0.0));
        Monitor::new(taps, ScaleModel::new(ScaleConfig::default()), clock)
    }

    fn replay(values: &[u64]) -> Box<ReplayFeed> {
        Box::new(ReplayFeed::new(values.to_vec()))
    }

    #[test]
    fn bounded_file_runs_to_completion() {
        let tap = Tap::new("FILE: f", replay(&[0, 250, 500, 750, 1000, 1000]))
            .with_expected_size(Some(1000));
        let mut m = monitor(vec![tap]);
        let mut rec = Recorder::default();
        let stop = AtomicBool::new(false);

        let outcome = run(&mut m, &mut rec, options(true), &stop).unwrap();
        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(rec.frames.len(), 5);

        let last = &rec.frames[4][0];
        assert_eq!(last.current, Some(250));
        assert_eq!(last.average, Some(250));
        assert_eq!(last.curve, 250);
        assert_eq!(last.eta, Some(0.0));
        assert_eq!(last.progress, Some(Progress { current: Some(1000), expected: 1000 }));
        assert_eq!(last.at, Some(4.0));
    }

    #[test]
    fn end_of_data_stops_the_run() {
        let mut m = monitor(vec![Tap::new("replay", replay(&[0, 10, 20]))]);
        let mut rec = Recorder::default();
        let stop = AtomicBool::new(false);
        let outcome = run(&mut m, &mut rec, options(true), &stop).unwrap();
        assert_eq!(outcome, Outcome::EndOfData);
        assert_eq!(rec.frames.len(), 3);
        assert_eq!(m.ticks(), 3);
    }

    #[test]
    fn any_tap_ending_ends_the_tick() {
        let mut m = monitor(vec![
            Tap::new("a", replay(&[0, 10, 20, 30])),
            Tap::new("b", replay(&[0])),
        ]);
        assert_eq!(m.sample(), Tick::Sampled { pending: 0 });
        assert_eq!(m.sample(), Tick::EndOfData);
        // the tap that still had data is left as it was after the last full tick
        assert_eq!(m.taps()[0].estimator().log().len(), 1);
        assert_eq!(m.taps()[0].series().len(), 1);
        assert_eq!(m.ticks(), 1);
    }

    #[test]
    fn user_quit_cancels() {
        let mut m = monitor(vec![Tap::new("a", replay(&[0, 1, 2, 3, 4, 5]))]);
        let mut rec = Recorder { quit_after: Some(2), ..Default::default() };
        let stop = AtomicBool::new(false);
        assert_eq!(run(&mut m, &mut rec, options(false), &stop).unwrap(), Outcome::Cancelled);
        assert_eq!(rec.frames.len(), 2);

        let stop = AtomicBool::new(true);
        assert_eq!(run(&mut m, &mut rec, options(false), &stop).unwrap(), Outcome::Cancelled);
    }

    #[test]
    fn exit_on_complete_ignored_without_bounded_taps() {
        let mut m = monitor(vec![Tap::new("a", replay(&[0, 5, 10]))]);
        let mut rec = Recorder::default();
        let stop = AtomicBool::new(false);
        assert_eq!(run(&mut m, &mut rec, options(true), &stop).unwrap(), Outcome::EndOfData);
    }

    #[test]
    fn pending_counts_incomplete_bounded_taps() {
        let mut m = monitor(vec![
            Tap::new("a", replay(&[0, 50])).with_expected_size(Some(100)),
            Tap::new("b", replay(&[100, 100])).with_expected_size(Some(100)),
            Tap::new("c", replay(&[0, 1])),
        ]);
        assert_eq!(m.sample(), Tick::Sampled { pending: 1 });
        let series = m.taps()[2].series();
        assert_eq!(series.len(), 1);
        assert_eq!(series.raw().back(), Some(&0));
    }
}

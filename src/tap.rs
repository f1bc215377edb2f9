use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::TapSpec;
use crate::feed::{
    Availability, BackgroundReader, Feed, FileFeed, Jobs, NetworkFeed, ReaderFeed, ReplayFeed,
};

/// A feed plus what the display needs to know about it.
pub struct Tap {
    description: String,
    feed: Box<dyn Feed>,
    expected_size: Option<u64>,
    wait: bool,
}

impl Tap {
    pub fn new(description: impl Into<String>, feed: Box<dyn Feed>) -> Self {
        Self {
            description: description.into(),
            feed,
            expected_size: None,
            wait: false,
        }
    }

    pub fn with_expected_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    /// Hold off sampling until the feed reports it is available.
    pub fn waiting_for_creation(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Build the tap a `TapSpec` asks for. Stream-backed taps register their reader
    /// with `jobs`; files wait for creation unless `zero_files` is set.
    pub fn from_spec(spec: &TapSpec, jobs: &Jobs, zero_files: bool) -> Self {
        match spec {
            TapSpec::File { path, expected_size } => Tap::new(
                format!("FILE: {}", path.display()),
                Box::new(FileFeed::new(path)),
            )
            .with_expected_size(*expected_size)
            .waiting_for_creation(!zero_files),
            TapSpec::Network { interface, direction } => Tap::new(
                format!("{direction}: {interface}"),
                Box::new(NetworkFeed::new(interface.clone(), *direction)),
            )
            .waiting_for_creation(true),
            TapSpec::Command(cmd) => Tap::new(
                format!("CMD: {cmd}"),
                Box::new(ReaderFeed::new(BackgroundReader::command(cmd.clone(), &jobs.subprocess))),
            ),
            TapSpec::Stdin => Tap::new(
                "Pipe/Stdin",
                Box::new(ReaderFeed::new(BackgroundReader::stdin(&jobs.stdin))),
            ),
        }
    }

    /// Swap the feed for a replay of `deltas`, keeping description and
    /// expected size.
    pub fn replay(mut self, deltas: &[u64]) -> Self {
        self.feed = Box::new(ReplayFeed::from_deltas(deltas));
        self.wait = false;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    pub fn sample(&mut self) -> Option<u64> {
        self.feed.sample()
    }

    /// Block until the feed is available, retrying every `retry`. Returns
    /// false if `stop` was raised first.
    pub fn wait_ready(&self, stop: &AtomicBool, retry: Duration) -> bool {
        if !self.wait {
            return true;
        }
        let mut announced = false;
        loop {
            match self.feed.availability() {
                Availability::Ready => return true,
                Availability::Waiting(msg) => {
                    if !announced {
                        println!("{msg}");
                        info!(tap = %self.description, "{msg}");
                        announced = true;
                    }
                }
            }
            if !sleep_unless_stopped(stop, retry) {
                return false;
            }
        }
    }
}

/// Point the last tap at a replay of `deltas`, or add a standalone replay
/// tap when there is none.
pub fn simulate_last(taps: &mut Vec<Tap>, deltas: &[u64]) {
    let tap = match taps.pop() {
        Some(last) => last.replay(deltas),
        None => Tap::new("Simulated", Box::new(ReplayFeed::from_deltas(deltas))),
    };
    taps.push(tap);
}

/// Sleep for `total` in short slices. False if `stop` was raised meanwhile.
pub fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

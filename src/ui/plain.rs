use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::OutputFormat;
use crate::format::{graphic_progress, graphic_speed, readable_time, Units};
use crate::monitor::{Monitor, RenderTarget, TapReport};
use crate::tap::sleep_unless_stopped;

const PROGRESS_COLUMNS: usize = 36;

/// One line per tick for a single tap, as text or JSON.
pub struct PlainText<W: Write> {
    out: W,
    format: OutputFormat,
    units: Units,
    stop: Arc<AtomicBool>,
}

impl<W: Write> PlainText<W> {
    pub fn new(out: W, format: OutputFormat, units: Units, stop: Arc<AtomicBool>) -> Self {
        Self { out, format, units, stop }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn text_line(&self, r: &TapReport) -> String {
        let u = self.units;
        match r.progress {
            Some(p) => format!(
                "({}){} [{}]  {}",
                graphic_speed(r.current),
                u.readable_speed(r.current),
                graphic_progress(p.fraction(), PROGRESS_COLUMNS),
                readable_time(r.eta, None),
            ),
            None => format!(
                "{}  c:{}  A:{}  ({})",
                u.readable_speed(r.current),
                u.readable_speed(Some(r.curve)),
                u.readable_speed(r.average),
                graphic_speed(r.current),
            ),
        }
    }
}

impl<W: Write> RenderTarget for PlainText<W> {
    fn render(&mut self, monitor: &Monitor) -> Result<()> {
        // the first tick has nothing to compare against
        if monitor.ticks() < 2 {
            return Ok(());
        }
        for report in monitor.reports() {
            match self.format {
                OutputFormat::Text => {
                    let line = self.text_line(&report);
                    writeln!(self.out, "{line}")
                }
                OutputFormat::Json => {
                    serde_json::to_writer(&mut self.out, &report).context("encode report")?;
                    writeln!(self.out)
                }
            }
            .context("write report")?;
        }
        self.out.flush().context("flush output")
    }

    fn wait(&mut self, wait: Duration) -> Result<bool> {
        Ok(sleep_unless_stopped(&self.stop, wait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ScaleConfig, ScaleModel};
    use crate::clock::{Clock, SimulatedClock};
    use crate::feed::ReplayFeed;
    use crate::monitor::{run, Outcome, RunOptions};
    use crate::tap::Tap;

    fn run_plain(tap: Tap, format: OutputFormat, exit_on_complete: bool) -> (Outcome, String) {
        let clock: Arc<dyn Clock> = Arc::new(SimulatedClock::new(0.0));
        let mut monitor = Monitor::new(vec![tap], ScaleModel::new(ScaleConfig::default()), clock);
        let stop = Arc::new(AtomicBool::new(false));
        let mut plain = PlainText::new(Vec::new(), format, Units::Bytes, Arc::clone(&stop));
        let options = RunOptions {
            interval: Duration::from_secs(1),
            initial_delay: Duration::from_millis(500),
            exit_on_complete,
        };
        let outcome = run(&mut monitor, &mut plain, options, &stop).unwrap();
        (outcome, String::from_utf8(plain.into_inner()).unwrap())
    }

    #[test]
    fn unbounded_text_lines() {
        let tap = Tap::new("x", Box::new(ReplayFeed::from_deltas(&[1000, 1000])));
        let (outcome, out) = run_plain(tap, OutputFormat::Text, false);
        assert_eq!(outcome, Outcome::EndOfData);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        // first interval is the half-second initial delay
        assert!(lines[0].starts_with("1.95 KiB/s  c:1.95 KiB/s  A:1.95 KiB/s  ("), "{}", lines[0]);
        assert!(lines[1].starts_with("1000 B/s    c:"), "{}", lines[1]);
        assert!(lines[1].ends_with(')'));
    }

    #[test]
    fn bounded_text_shows_progress_and_exits() {
        let tap = Tap::new("f", Box::new(ReplayFeed::from_deltas(&[100, 100, 100, 100, 100, 100])))
            .with_expected_size(Some(400));
        let (outcome, out) = run_plain(tap, OutputFormat::Text, true);
        assert_eq!(outcome, Outcome::Complete);
        let last = out.lines().last().unwrap();
        assert!(last.contains(&format!("[{}]", "#".repeat(PROGRESS_COLUMNS))), "{last}");
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn json_lines_parse() {
        let tap = Tap::new("CMD: yes", Box::new(ReplayFeed::from_deltas(&[10, 20])));
        let (_, out) = run_plain(tap, OutputFormat::Json, false);
        let values: Vec<serde_json::Value> =
            out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["description"], "CMD: yes");
        assert_eq!(values[1]["bytes"], 30);
        assert_eq!(values[1]["current"], 20);
        assert!(values[1]["progress"].is_null());
    }
}

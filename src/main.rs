mod chart;
mod cli;
mod clock;
mod config;
mod feed;
mod format;
mod meter;
mod monitor;
mod tap;
mod ui;

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::chart::ScaleModel;
use crate::cli::Cli;
use crate::clock::{Clock, SimulatedClock, SystemClock};
use crate::config::{ConfigError, DisplayMode, Settings};
use crate::feed::network::list_interfaces;
use crate::feed::Jobs;
use crate::monitor::{Monitor, RenderTarget, RunOptions};
use crate::tap::{simulate_last, Tap};
use crate::ui::{Dashboard, PlainText};

const CREATION_RETRY: Duration = Duration::from_secs(1);

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();

    let cli = Cli::parse();
    if let Err(err) = run_cli(cli) {
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:#}");
        std::process::exit(code);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(cli, std::io::stdin().is_terminal(), list_interfaces)?;

    let stop = Arc::new(AtomicBool::new(false));
    let jobs = Arc::new(Jobs::new());
    {
        let stop = Arc::clone(&stop);
        let jobs = Arc::clone(&jobs);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
            jobs.stop_all();
        })
        .context("install Ctrl-C handler")?;
    }

    let mut taps: Vec<Tap> = settings
        .taps
        .iter()
        .map(|spec| Tap::from_spec(spec, &jobs, settings.zero_files))
        .collect();
    let clock: Arc<dyn Clock> = match &settings.simulate {
        Some(deltas) => {
            simulate_last(&mut taps, deltas);
            Arc::new(SimulatedClock::new(0.0))
        }
        None => Arc::new(SystemClock),
    };

    for tap in &taps {
        if !tap.wait_ready(&stop, CREATION_RETRY) {
            jobs.stop_all();
            return Ok(());
        }
    }

    let units = settings.scale.units();
    let mut monitor = Monitor::new(taps, ScaleModel::new(settings.scale), clock);
    let options = RunOptions {
        interval: settings.interval,
        initial_delay: settings.initial_delay,
        exit_on_complete: settings.exit_on_complete,
    };

    let outcome = {
        let mut target: Box<dyn RenderTarget> = match settings.display {
            DisplayMode::Plain(format) => Box::new(PlainText::new(
                std::io::stdout(),
                format,
                units,
                Arc::clone(&stop),
            )),
            DisplayMode::Dashboard => {
                Box::new(Dashboard::new(settings.colors, units, Arc::clone(&stop))?)
            }
        };
        crate::monitor::run(&mut monitor, target.as_mut(), options, &stop)
    };

    let stopped = jobs.stop_all();
    info!(?outcome, stopped, "Monitoring finished");
    outcome.map(|_| ())
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: bad arguments, 1: other
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return 2;
        }
    }
    1
}

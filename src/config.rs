//! Validated run settings built from the command line.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::chart::scale::{ScaleConfig, ScaleError, ScaleMode};
use crate::cli::{Cli, OutputFormat};
use crate::feed::Direction;
use crate::format::Units;

pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error("interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),
    #[error("unsupported number of colors: {0} (use 1, 16, 88 or 256)")]
    UnsupportedColors(u16),
    #[error("plain output shows a single tap, {0} were given")]
    PlainNeedsOneTap(usize),
    #[error("no taps given and no network interfaces found")]
    NoTaps,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorDepth {
    Mono,
    Basic,
    Extended,
    Full,
}

impl TryFrom<u16> for ColorDepth {
    type Error = ConfigError;

    fn try_from(colors: u16) -> Result<Self, Self::Error> {
        match colors {
            1 => Ok(ColorDepth::Mono),
            16 => Ok(ColorDepth::Basic),
            88 => Ok(ColorDepth::Extended),
            256 => Ok(ColorDepth::Full),
            other => Err(ConfigError::UnsupportedColors(other)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Plain(OutputFormat),
    Dashboard,
}

/// One monitoring target as requested by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapSpec {
    File { path: PathBuf, expected_size: Option<u64> },
    Network { interface: String, direction: Direction },
    Command(String),
    Stdin,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub scale: ScaleConfig,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub display: DisplayMode,
    pub exit_on_complete: bool,
    pub zero_files: bool,
    pub colors: ColorDepth,
    pub taps: Vec<TapSpec>,
    pub simulate: Option<Vec<u64>>,
}

impl Settings {
    /// Validate the command line. `interfaces` is only consulted when no tap
    /// was given.
    pub fn from_cli(
        cli: Cli,
        stdin_is_terminal: bool,
        interfaces: impl FnOnce() -> Vec<String>,
    ) -> Result<Self, ConfigError> {
        let mode = if cli.linear { ScaleMode::Linear } else { ScaleMode::Logarithmic };
        let units = if cli.bits { Units::Bits } else { Units::Bytes };
        let scale = ScaleConfig::new(cli.min, cli.max, mode, units)?;

        if !cli.interval.is_finite() || cli.interval <= 0.0 {
            return Err(ConfigError::InvalidInterval(cli.interval));
        }
        let interval = Duration::try_from_secs_f64(cli.interval)
            .map_err(|_| ConfigError::InvalidInterval(cli.interval))?;
        let colors = ColorDepth::try_from(cli.colors)?;

        let mut taps = Vec::new();
        if !stdin_is_terminal {
            taps.push(TapSpec::Stdin);
        }
        taps.extend(cli.files.into_iter().map(|f| TapSpec::File {
            path: f.path,
            expected_size: f.expected_size,
        }));
        taps.extend(cli.rx.into_iter().map(|interface| TapSpec::Network {
            interface,
            direction: Direction::Rx,
        }));
        taps.extend(cli.tx.into_iter().map(|interface| TapSpec::Network {
            interface,
            direction: Direction::Tx,
        }));
        taps.extend(cli.commands.into_iter().map(TapSpec::Command));

        if taps.is_empty() && cli.simulate.is_none() {
            for interface in interfaces() {
                taps.push(TapSpec::Network { interface: interface.clone(), direction: Direction::Rx });
                taps.push(TapSpec::Network { interface, direction: Direction::Tx });
            }
            if taps.is_empty() {
                return Err(ConfigError::NoTaps);
            }
        }

        let plain = cli.plain || !stdin_is_terminal || cli.format == OutputFormat::Json;
        let display = if plain { DisplayMode::Plain(cli.format) } else { DisplayMode::Dashboard };
        if plain && taps.len() > 1 {
            return Err(ConfigError::PlainNeedsOneTap(taps.len()));
        }

        Ok(Self {
            scale,
            interval,
            initial_delay: INITIAL_DELAY.min(interval),
            display,
            exit_on_complete: cli.exit_on_complete,
            zero_files: cli.zero_files,
            colors,
            taps,
            simulate: cli.simulate,
        })
    }
}

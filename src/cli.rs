use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::chart::scale::{DEFAULT_CHART_MAX, DEFAULT_CHART_MIN};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = "With no taps, every network interface is monitored in both directions. \
When standard input is not a terminal it is monitored as a tap and plain output is used.")]
pub struct Cli {
    /// Display download speed of a file, with a progress bar when SIZE is given
    #[arg(short = 'f', long = "file", value_name = "PATH[:SIZE]", value_parser = parse_file_arg)]
    pub files: Vec<FileArg>,

    /// Display bytes received on a network interface
    #[arg(short = 'r', long = "rx", value_name = "IFACE")]
    pub rx: Vec<String>,

    /// Display bytes transmitted on a network interface
    #[arg(short = 't', long = "tx", value_name = "IFACE")]
    pub tx: Vec<String>,

    /// Display bytes received from a shell command's standard output
    #[arg(short = 'd', long = "command", value_name = "CMD")]
    pub commands: Vec<String>,

    /// Sampling interval in seconds, eg. "5" or "0.25"
    #[arg(short = 'i', long, default_value_t = 1.0)]
    pub interval: f64,

    /// Use linear charts instead of logarithmic (you will likely want --max too)
    #[arg(short = 'l', long)]
    pub linear: bool,

    /// Maximum bytes/second displayed on the chart
    #[arg(short = 'm', long, default_value_t = DEFAULT_CHART_MAX)]
    pub max: u64,

    /// Minimum bytes/second displayed on the chart
    #[arg(short = 'n', long, default_value_t = DEFAULT_CHART_MIN)]
    pub min: u64,

    /// Use bits/s instead of bytes/s
    #[arg(short = 's', long)]
    pub bits: bool,

    /// Exit when files reach their expected size
    #[arg(short = 'x', long)]
    pub exit_on_complete: bool,

    /// Report zero size for files that don't exist instead of waiting for them
    #[arg(short = 'z', long)]
    pub zero_files: bool,

    /// Plain-text output (one tap only)
    #[arg(short = 'p', long)]
    pub plain: bool,

    /// Number of colors the terminal supports: 1, 16, 88 or 256
    #[arg(short = 'k', long, default_value_t = 16)]
    pub colors: u16,

    /// Plain output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Replay these byte deltas on the last tap, one per interval, on a simulated clock
    #[arg(long, num_args = 1.., value_name = "DELTA", hide = true)]
    pub simulate: Option<Vec<u64>>,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileArg {
    pub path: PathBuf,
    pub expected_size: Option<u64>,
}

/// `PATH` or `PATH:SIZE`. The suffix only counts as a size if it is a
/// number, so paths containing colons still work.
fn parse_file_arg(s: &str) -> Result<FileArg, String> {
    if s.is_empty() {
        return Err("empty file name".into());
    }
    if let Some((path, size)) = s.rsplit_once(':') {
        if let Ok(size) = size.parse::<u64>() {
            if path.is_empty() {
                return Err(format!("missing file name before size in '{s}'"));
            }
            return Ok(FileArg { path: path.into(), expected_size: Some(size) });
        }
    }
    Ok(FileArg { path: s.into(), expected_size: None })
}

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use crate::format::Units;

#[derive(ValueEnum, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    #[default]
    Logarithmic,
    Linear,
}

pub const DEFAULT_CHART_MIN: u64 = 1 << 5;
pub const DEFAULT_CHART_MAX: u64 = 1 << 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScaleError {
    #[error("chart maximum ({max}) must be greater than chart minimum ({min})")]
    EmptyRange { min: u64, max: u64 },
    #[error("logarithmic chart minimum must be at least 1 byte/s")]
    ZeroLogMinimum,
    #[error("chart maximum ({max}) is larger than {}", i64::MAX)]
    TooLarge { max: u64 },
}

/// Chart bounds and regime, fixed for the whole run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScaleConfig {
    min: u64,
    max: u64,
    mode: ScaleMode,
    units: Units,
}

impl ScaleConfig {
    pub fn new(min: u64, max: u64, mode: ScaleMode, units: Units) -> Result<Self, ScaleError> {
        if max <= min {
            return Err(ScaleError::EmptyRange { min, max });
        }
        if max > i64::MAX as u64 {
            return Err(ScaleError::TooLarge { max });
        }
        if mode == ScaleMode::Logarithmic && min == 0 {
            return Err(ScaleError::ZeroLogMinimum);
        }
        Ok(Self { min, max, mode, units })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn mode(&self) -> ScaleMode {
        self.mode
    }

    pub fn units(&self) -> Units {
        self.units
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_CHART_MIN,
            max: DEFAULT_CHART_MAX,
            mode: ScaleMode::default(),
            units: Units::default(),
        }
    }
}

/// A horizontal guide line on the chart.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisLabel {
    /// Raw rate in bytes per second.
    pub value: u64,
    /// Position in chart space.
    pub position: f64,
    pub caption: String,
}

const BYTE_LABELS: [(u64, &str); 5] = [
    (1 << 10, " 1KiB/s"),
    (1 << 15, "32KiB/s"),
    (1 << 20, " 1MiB/s"),
    (1 << 25, "32MiB/s"),
    (1 << 30, " 1GiB/s"),
];

const BIT_LABELS: [(u64, &str); 5] = [
    (1 << 7, " 1Kib/s"),
    (1 << 12, "32Kib/s"),
    (1 << 17, " 1Mib/s"),
    (1 << 22, "32Mib/s"),
    (1 << 27, " 1Gib/s"),
];

/// Maps rates to chart space and lists the axis labels for a `ScaleConfig`.
///
/// Chart space runs from 0 (at the configured minimum) to `range()` (at the
/// configured maximum).
#[derive(Clone, Debug)]
pub struct ScaleModel {
    config: ScaleConfig,
    floor: f64,
    range: f64,
    labels: Vec<AxisLabel>,
}

impl ScaleModel {
    pub fn new(config: ScaleConfig) -> Self {
        let (floor, ceil) = match config.mode {
            ScaleMode::Logarithmic => ((config.min as f64).log2(), (config.max as f64).log2()),
            ScaleMode::Linear => (config.min as f64, config.max as f64),
        };
        let mut model = Self {
            config,
            floor,
            range: ceil - floor,
            labels: Vec::new(),
        };
        model.labels = model.build_labels();
        model
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Chart position of a rate, clamped to `[0, range]`.
    pub fn position(&self, rate: Option<i64>) -> f64 {
        let rate = match rate {
            Some(r) if r > 0 => r as f64,
            _ => return 0.0,
        };
        let value = match self.config.mode {
            ScaleMode::Logarithmic => rate.log2(),
            ScaleMode::Linear => rate,
        };
        (value - self.floor).clamp(0.0, self.range)
    }

    /// Axis labels ordered from the top of the chart down.
    pub fn labels(&self) -> &[AxisLabel] {
        &self.labels
    }

    /// Step between linear guide lines: the largest power of two that still
    /// leaves at least four lines between minimum and maximum.
    pub fn granularity(&self) -> u64 {
        let span = (self.config.max - self.config.min) as f64;
        let exp = (span.log2() - 2.0).floor().max(0.0) as u32;
        1u64 << exp.min(63)
    }

    fn build_labels(&self) -> Vec<AxisLabel> {
        let (min, max) = (self.config.min, self.config.max);
        let mut out: Vec<AxisLabel> = match self.config.mode {
            ScaleMode::Logarithmic => {
                let table = match self.config.units {
                    Units::Bytes => &BYTE_LABELS,
                    Units::Bits => &BIT_LABELS,
                };
                table
                    .iter()
                    .filter(|(value, _)| min < *value && *value < max)
                    .map(|&(value, caption)| self.label(value, caption.to_string()))
                    .collect()
            }
            ScaleMode::Linear => {
                let step = self.granularity();
                let mut n = match min % step {
                    0 => min,
                    rem => min - rem + step,
                };
                let mut out = Vec::new();
                while n < max {
                    let caption = self.config.units.readable_speed(Some(n as i64));
                    out.push(self.label(n, caption));
                    match n.checked_add(step) {
                        Some(next) => n = next,
                        None => break,
                    }
                }
                out
            }
        };
        out.reverse();
        out
    }

    fn label(&self, value: u64, caption: String) -> AxisLabel {
        AxisLabel {
            value,
            position: self.position(Some(value as i64)),
            caption,
        }
    }
}

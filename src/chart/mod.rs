//! Chart-space scaling and per-display series history.

pub mod scale;
pub mod series;

pub use scale::{AxisLabel, ScaleConfig, ScaleError, ScaleMode, ScaleModel};
pub use series::{local_maximums, Peak, PeakWindow, SeriesBuffer};

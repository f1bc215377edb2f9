//! Sample history and the rate figures derived from it.

pub mod estimator;
pub mod log;

pub use estimator::{Progress, RateEstimator};
pub use log::{delta_to_speed, Reading, SampleLog};

/// Readings kept per tap: enough for the six-interval curve.
pub const DEFAULT_MAXLOG: usize = 6;

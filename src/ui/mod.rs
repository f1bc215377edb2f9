//! Render targets for the sampling loop.

pub mod dashboard;
pub mod plain;

pub use dashboard::Dashboard;
pub use plain::PlainText;

//! Byte-count sources polled once per sampling tick.

pub mod file;
pub mod network;
pub mod registry;
pub mod replay;
pub mod stream;

pub use file::FileFeed;
pub use network::{Direction, NetworkFeed};
pub use registry::{JobRegistry, Jobs};
pub use replay::ReplayFeed;
pub use stream::{BackgroundReader, ReaderFeed, ReaderKind, ReaderState, StreamSource};

/// A pollable, non-decreasing byte counter.
pub trait Feed: Send {
    /// Current byte count, or `None` once the source has no more data.
    fn sample(&mut self) -> Option<u64>;

    /// Whether sampling can begin yet.
    fn availability(&self) -> Availability {
        Availability::Ready
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// Not there yet; the message says what is being waited for.
    Waiting(String),
}

use std::collections::VecDeque;

use super::Feed;

/// Replays a fixed sequence of counter values, then reports end of data.
pub struct ReplayFeed {
    values: VecDeque<u64>,
}

impl ReplayFeed {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self { values: values.into_iter().collect() }
    }

    /// Counter starting at 0 and growing by each delta in turn.
    pub fn from_deltas(deltas: &[u64]) -> Self {
        let mut total = 0u64;
        let values = std::iter::once(0).chain(deltas.iter().map(|d| {
            total = total.saturating_add(*d);
            total
        }));
        Self::new(values.collect::<Vec<_>>())
    }
}

impl Feed for ReplayFeed {
    fn sample(&mut self) -> Option<u64> {
        self.values.pop_front()
    }
}

use std::collections::VecDeque;

use super::scale::ScaleModel;

/// Samples kept per display regardless of how long the run lasts.
pub const HISTORY_LEN: usize = 300;

/// How much context a sample needs on each side before it can be called a
/// peak. Accepted peaks also suppress other candidates within
/// `left + right` indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PeakWindow {
    pub left: usize,
    pub right: usize,
}

impl Default for PeakWindow {
    fn default() -> Self {
        Self { left: 4, right: 5 }
    }
}

/// A local maximum picked for annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Peak {
    /// Index into the full history.
    pub index: usize,
    /// Column within the visible window, padding included.
    pub column: usize,
    pub rate: i64,
    pub position: f64,
}

/// Rolling history of raw rates and their chart positions for one display.
#[derive(Clone, Debug)]
pub struct SeriesBuffer {
    raw: VecDeque<i64>,
    scaled: VecDeque<f64>,
    capacity: usize,
    window: PeakWindow,
}

impl Default for SeriesBuffer {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}

impl SeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            raw: VecDeque::with_capacity(capacity),
            scaled: VecDeque::with_capacity(capacity),
            capacity,
            window: PeakWindow::default(),
        }
    }

    pub fn with_window(mut self, window: PeakWindow) -> Self {
        self.window = window;
        self
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Record a rate; a missing rate is kept as 0.
    pub fn append(&mut self, rate: Option<i64>, scale: &ScaleModel) {
        self.raw.push_back(rate.unwrap_or(0));
        self.scaled.push_back(scale.position(rate));
        while self.raw.len() > self.capacity {
            self.raw.pop_front();
            self.scaled.pop_front();
        }
    }

    pub fn raw(&self) -> &VecDeque<i64> {
        &self.raw
    }

    /// The last `maxcol` chart positions, left-padded with zeros.
    pub fn visible(&self, maxcol: usize) -> Vec<f64> {
        let left = self.scaled.len().saturating_sub(maxcol);
        let shown = self.scaled.len() - left;
        std::iter::repeat(0.0)
            .take(maxcol - shown)
            .chain(self.scaled.iter().skip(left).copied())
            .collect()
    }

    /// Peaks worth labelling in a view `maxcol` columns wide, left to right.
    pub fn peaks(&self, maxcol: usize) -> Vec<Peak> {
        let left = self.raw.len().saturating_sub(maxcol);
        let pad = maxcol - (self.raw.len() - left);
        let log: Vec<i64> = self.raw.iter().copied().collect();
        local_maximums(&log, pad, left, self.window)
            .into_iter()
            .map(|index| Peak {
                index,
                column: pad + index - left,
                rate: log[index],
                position: self.scaled[index],
            })
            .collect()
    }
}

/// Indexes of the local maximums in `log`, in ascending order.
///
/// Scanning starts at `left` (the first visible sample), skipping samples
/// too close to the padded edge, and ignores the last `window.right`
/// samples. Candidates are accepted highest first, earlier index winning
/// ties, and each one hides the candidates around it.
pub fn local_maximums(log: &[i64], pad: usize, left: usize, window: PeakWindow) -> Vec<usize> {
    let dist = window.left + window.right;
    if log.len() <= dist {
        return Vec::new();
    }

    let start = left + window.left.saturating_sub(pad);
    let end = log.len() - window.right;
    let mut highs: Vec<(i64, usize)> = Vec::new();
    for i in start..end {
        let li = log[i];
        if li == 0 {
            continue;
        }
        if i > 0 && log[i - 1] >= li {
            continue;
        }
        if log.get(i + 1).map_or(false, |&next| next > li) {
            continue;
        }
        highs.push((li, i));
    }

    highs.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut tagged = vec![false; log.len()];
    let mut out = Vec::new();
    for (_, i) in highs {
        if tagged[i] {
            continue;
        }
        let lo = i.saturating_sub(dist);
        let hi = (i + dist).min(log.len());
        tagged[lo..hi].iter_mut().for_each(|t| *t = true);
        out.push(i);
    }
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::scale::{ScaleConfig, ScaleModel};

    fn spikes(len: usize, at: &[(usize, i64)]) -> Vec<i64> {
        let mut log = vec![0; len];
        for &(i, v) in at {
            log[i] = v;
        }
        log
    }

    #[test]
    fn picks_both_peaks_in_short_series() {
        let log = [0, 1, 5, 2, 1, 6, 1, 0];
        let window = PeakWindow { left: 1, right: 1 };
        assert_eq!(local_maximums(&log, 0, 0, window), vec![2, 5]);
    }

    #[test]
    fn too_short_history_has_no_peaks() {
        let log = spikes(9, &[(4, 10)]);
        assert!(local_maximums(&log, 0, 0, PeakWindow::default()).is_empty());
    }

    #[test]
    fn higher_peak_suppresses_close_neighbour() {
        let log = spikes(20, &[(8, 100), (12, 50)]);
        assert_eq!(local_maximums(&log, 0, 0, PeakWindow::default()), vec![8]);
    }

    #[test]
    fn distant_peaks_both_survive_in_order() {
        let log = spikes(25, &[(5, 30), (15, 70)]);
        assert_eq!(local_maximums(&log, 0, 0, PeakWindow::default()), vec![5, 15]);
    }

    #[test]
    fn ignores_trailing_and_leading_edges() {
        let log = spikes(20, &[(2, 90), (17, 90)]);
        assert!(local_maximums(&log, 0, 0, PeakWindow::default()).is_empty());
    }

    #[test]
    fn plateau_resolves_to_first_index() {
        let log = spikes(20, &[(6, 7), (7, 7)]);
        assert_eq!(local_maximums(&log, 0, 0, PeakWindow::default()), vec![6]);
    }

    #[test]
    fn equal_peaks_prefer_earlier_index() {
        let log = spikes(20, &[(6, 40), (10, 40)]);
        assert_eq!(local_maximums(&log, 0, 0, PeakWindow::default()), vec![6]);
    }

    #[test]
    fn buffer_trims_to_capacity() {
        let scale = ScaleModel::new(ScaleConfig::default());
        let mut buf = SeriesBuffer::new(5);
        for i in 0..8 {
            buf.append(Some(i * 100), &scale);
        }
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.raw().front(), Some(&300));
    }

    #[test]
    fn visible_is_left_padded() {
        let scale = ScaleModel::new(ScaleConfig::default());
        let mut buf = SeriesBuffer::default();
        buf.append(None, &scale);
        buf.append(Some(64), &scale);
        assert_eq!(buf.visible(4), vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(buf.visible(1), vec![1.0]);
    }

    #[test]
    fn peaks_map_to_visible_columns() {
        let scale = ScaleModel::new(ScaleConfig::default());
        let mut buf = SeriesBuffer::default();
        for v in spikes(30, &[(20, 4096)]) {
            buf.append(Some(v), &scale);
        }
        // 30 samples in 20 columns: samples 10.. are shown
        let peaks = buf.peaks(20);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 20);
        assert_eq!(peaks[0].column, 10);
        assert_eq!(peaks[0].rate, 4096);
        assert_eq!(peaks[0].position, 7.0);

        // wider than the history: 10 columns of padding
        let peaks = buf.peaks(40);
        assert_eq!(peaks[0].column, 30);
    }
}

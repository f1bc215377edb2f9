use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::stream::{BackgroundReader, ReaderKind};

/// Every background reader of one kind, so a quit can reach all of them.
///
/// Entries are never removed: the process exits shortly after a stop.
pub struct JobRegistry {
    kind: ReaderKind,
    next_id: AtomicU64,
    // concurrent map: the interrupt handler may stop readers while taps are
    // still being set up
    jobs: DashMap<u64, Arc<BackgroundReader>>,
}

impl JobRegistry {
    pub fn new(kind: ReaderKind) -> Self {
        Self {
            kind,
            next_id: AtomicU64::new(0),
            jobs: DashMap::new(),
        }
    }

    pub fn kind(&self) -> ReaderKind {
        self.kind
    }

    pub fn register(&self, reader: Arc<BackgroundReader>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.jobs.insert(id, reader);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Stop every registered reader. Returns how many were still active.
    pub fn stop_all(&self) -> usize {
        // Snapshot first so no shard lock is held across the settle delay.
        let snapshot: Vec<Arc<BackgroundReader>> =
            self.jobs.iter().map(|e| Arc::clone(e.value())).collect();
        let stopped = snapshot.iter().filter(|reader| reader.stop()).count();
        debug!(kind = %self.kind, stopped, "Stopped readers");
        stopped
    }
}

/// The registries for each kind of background reader.
pub struct Jobs {
    pub subprocess: JobRegistry,
    pub stdin: JobRegistry,
}

impl Jobs {
    pub fn new() -> Self {
        Self {
            subprocess: JobRegistry::new(ReaderKind::Subprocess),
            stdin: JobRegistry::new(ReaderKind::Stdin),
        }
    }

    pub fn registry(&self, kind: ReaderKind) -> &JobRegistry {
        match kind {
            ReaderKind::Subprocess => &self.subprocess,
            ReaderKind::Stdin => &self.stdin,
        }
    }

    pub fn stop_all(&self) -> usize {
        self.subprocess.stop_all() + self.stdin.stop_all()
    }
}

impl Default for Jobs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::stream::{ReaderState, StreamSource};
    use std::io::Cursor;

    #[test]
    fn stop_all_reaches_every_reader_and_keeps_entries() {
        let jobs = Jobs::new();
        let a = BackgroundReader::command("true", &jobs.subprocess);
        let b = BackgroundReader::command("true", &jobs.subprocess);
        let c = BackgroundReader::stdin(&jobs.stdin);
        assert_eq!(jobs.subprocess.len(), 2);
        assert_eq!(jobs.stdin.len(), 1);

        assert_eq!(jobs.stop_all(), 3);
        for reader in [&a, &b, &c] {
            assert_eq!(reader.state(), ReaderState::Stopped);
            assert_eq!(reader.poll(), None);
        }
        assert_eq!(jobs.subprocess.len(), 2);
        assert_eq!(jobs.stop_all(), 0);
    }

    #[test]
    fn registry_lookup_by_kind() {
        let jobs = Jobs::default();
        let reader = BackgroundReader::new(
            ReaderKind::Stdin,
            StreamSource::Reader(Box::new(Cursor::new(vec![0u8; 16]))),
            jobs.registry(ReaderKind::Stdin),
        );
        assert_eq!(reader.kind(), ReaderKind::Stdin);
        assert_eq!(jobs.registry(ReaderKind::Stdin).len(), 1);
        assert!(jobs.registry(ReaderKind::Subprocess).is_empty());
    }
}

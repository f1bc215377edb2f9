use std::fs;
use std::path::{Path, PathBuf};

use super::{Availability, Feed};

/// Size of a file on disk. A missing or unreadable file reads as 0 bytes.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Feed for FileFeed {
    fn sample(&mut self) -> Option<u64> {
        Some(fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0))
    }

    fn availability(&self) -> Availability {
        if self.path.exists() {
            Availability::Ready
        } else {
            Availability::Waiting(format!(
                "Waiting for '{}' to be created...",
                self.path.display()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ratemon-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file_waits_and_reads_zero() {
        let path = scratch("missing");
        let _ = fs::remove_file(&path);
        let mut feed = FileFeed::new(&path);
        assert!(matches!(feed.availability(), Availability::Waiting(msg) if msg.contains("ratemon")));
        assert_eq!(feed.sample(), Some(0));
    }

    #[test]
    fn tracks_file_growth() {
        let path = scratch("grow");
        fs::write(&path, vec![0u8; 100]).unwrap();
        let mut feed = FileFeed::new(&path);
        assert_eq!(feed.availability(), Availability::Ready);
        assert_eq!(feed.sample(), Some(100));
        fs::write(&path, vec![0u8; 4096]).unwrap();
        assert_eq!(feed.sample(), Some(4096));
        fs::remove_file(&path).unwrap();
    }
}

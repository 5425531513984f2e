//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files scanned so far.
    pub files_scanned: u64,
    /// Number of directories scanned so far.
    pub dirs_scanned: u64,
    /// Total bytes scanned so far.
    pub bytes_scanned: u64,
    /// Most recent path seen.
    pub current_path: PathBuf,
    /// Number of warnings encountered.
    pub warnings: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files_scanned as f64 / secs
        } else {
            0.0
        }
    }
}

/// Running counters owned by the scanner.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    files_scanned: u64,
    dirs_scanned: u64,
    bytes_scanned: u64,
    warnings: u64,
    entries_seen: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    /// Entries between two progress broadcasts.
    pub const REPORT_INTERVAL: u64 = 1000;

    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            warnings: 0,
            entries_seen: 0,
            current_path: PathBuf::new(),
        }
    }

    /// Record a file. Returns `true` when a progress report is due.
    pub fn record_file(&mut self, path: &std::path::Path, size: u64) -> bool {
        self.files_scanned += 1;
        self.bytes_scanned += size;
        self.bump(path)
    }

    /// Record a directory. Returns `true` when a progress report is due.
    pub fn record_dir(&mut self, path: &std::path::Path) -> bool {
        self.dirs_scanned += 1;
        self.bump(path)
    }

    pub fn record_warning(&mut self) {
        self.warnings += 1;
    }

    fn bump(&mut self, path: &std::path::Path) -> bool {
        self.entries_seen += 1;
        if self.entries_seen % Self::REPORT_INTERVAL == 0 {
            self.current_path = path.to_path_buf();
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            files_scanned: self.files_scanned,
            dirs_scanned: self.dirs_scanned,
            bytes_scanned: self.bytes_scanned,
            current_path: self.current_path.clone(),
            warnings: self.warnings,
            elapsed: self.start_time.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_report_interval() {
        let mut tracker = ProgressTracker::new();
        let due = (0..ProgressTracker::REPORT_INTERVAL)
            .filter(|_| tracker.record_file(Path::new("/x"), 2))
            .count();

        assert_eq!(due, 1);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.files_scanned, ProgressTracker::REPORT_INTERVAL);
        assert_eq!(snapshot.bytes_scanned, 2 * ProgressTracker::REPORT_INTERVAL);
        assert_eq!(snapshot.current_path, PathBuf::from("/x"));
    }
}

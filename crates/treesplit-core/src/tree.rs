//! File tree container and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::node::FileNode;

/// Summary statistics for a scanned tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories.
    pub total_dirs: u64,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, size: u64) {
        self.total_files += 1;
        self.total_size += size;
    }

    /// Record a directory.
    pub fn record_dir(&mut self) {
        self.total_dirs += 1;
    }
}

/// Complete scanned file tree with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTree {
    /// Root node of the tree.
    pub root: FileNode,

    /// Root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during scan.
    #[serde(default)]
    pub warnings: Vec<ScanWarning>,
}

impl FileTree {
    /// Create a new file tree.
    pub fn new(
        root: FileNode,
        root_path: PathBuf,
        config: ScanConfig,
        stats: TreeStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            root_path,
            scanned_at: SystemTime::now(),
            scan_duration,
            config,
            stats,
            warnings,
        }
    }

    /// Wrap a hand-built root node, recomputing its aggregates.
    pub fn from_root(mut root: FileNode, root_path: impl Into<PathBuf>) -> Self {
        root.recompute_aggregates();
        let root_path = root_path.into();
        let stats = TreeStats {
            total_size: root.size,
            total_files: root.file_count(),
            total_dirs: root.dir_count(),
        };
        let config = ScanConfig::new(&root_path);
        Self::new(root, root_path, config, stats, Duration::ZERO, Vec::new())
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.size
    }

    /// Get the total number of files.
    pub fn total_files(&self) -> u64 {
        self.stats.total_files
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Every leaf under the root as a root-relative path.
    pub fn leaves(&self) -> Vec<String> {
        self.root.leaves()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn test_tree_stats_record_file() {
        let mut stats = TreeStats::new();
        stats.record_file(10);
        stats.record_file(1024);
        stats.record_dir();

        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 1034);
        assert_eq!(stats.total_dirs, 1);
    }

    #[test]
    fn test_leaves() {
        let mut sub = FileNode::new_directory(NodeId::new(2), "sub");
        sub.children.push(FileNode::new_file(NodeId::new(3), "x", 3));
        let empty = FileNode::new_directory(NodeId::new(4), "empty");

        let mut root = FileNode::new_directory(NodeId::new(1), "root");
        root.children.push(sub);
        root.children.push(empty);
        root.children.push(FileNode::new_file(NodeId::new(5), "y", 4));

        let tree = FileTree::from_root(root, "/data");
        assert_eq!(tree.total_size(), 7);
        assert_eq!(tree.leaves(), vec!["sub/x", "empty/", "y"]);
    }
}

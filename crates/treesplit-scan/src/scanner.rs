//! JWalk-based parallel directory scanner.

use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tracing::debug;

use treesplit_core::{
    FileNode, FileTree, InodeInfo, NodeId, NodeKind, ScanConfig, ScanError, ScanWarning,
    TreeStats, WarningKind,
};

use crate::inode::InodeTracker;
use crate::progress::{ProgressTracker, ScanProgress};

/// Scanner building a [`FileTree`] with per-directory aggregates.
pub struct JwalkScanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl JwalkScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the configured root.
    pub fn scan(&self, config: &ScanConfig) -> Result<FileTree, ScanError> {
        let start = Instant::now();
        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        let root_device = get_dev(&root_metadata);

        let mut stats = TreeStats::new();
        let mut warnings = Vec::new();

        let mut entries =
            self.collect_entries(config, &root_path, root_device, &mut stats, &mut warnings)?;

        let node_ids = AtomicU64::new(0);
        let root_node = build_node(
            &root_path,
            root_path.display().to_string().into(),
            &mut entries,
            &node_ids,
        );

        let scan_duration = start.elapsed();
        debug!(
            root = %root_path.display(),
            files = stats.total_files,
            dirs = stats.total_dirs,
            elapsed_ms = scan_duration.as_millis() as u64,
            "scan finished"
        );

        Ok(FileTree::new(
            root_node,
            root_path,
            config.clone(),
            stats,
            scan_duration,
            warnings,
        ))
    }

    /// Walk the tree and group entries by parent directory.
    fn collect_entries(
        &self,
        config: &ScanConfig,
        root_path: &Path,
        root_device: u64,
        stats: &mut TreeStats,
        warnings: &mut Vec<ScanWarning>,
    ) -> Result<HashMap<PathBuf, Vec<EntryInfo>>, ScanError> {
        let ignore = config
            .ignore_matcher()
            .map_err(|e| ScanError::InvalidPattern {
                message: e.to_string(),
            })?;

        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let walker = WalkDir::new(root_path)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!config.include_hidden)
            .follow_links(config.follow_symlinks)
            .min_depth(1);

        let inodes = InodeTracker::new();
        let mut progress = ProgressTracker::new();
        let mut entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>> = HashMap::new();
        // Directories whose contents must not appear in the tree.
        let mut pruned: HashSet<PathBuf> = HashSet::new();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    warnings.push(ScanWarning::new(path, err.to_string(), WarningKind::ReadError));
                    progress.record_warning();
                    continue;
                }
            };

            let path = entry.path();
            let Some(parent) = path.parent().map(Path::to_path_buf) else {
                continue;
            };
            let file_type = entry.file_type();

            if pruned.contains(&parent) {
                if file_type.is_dir() {
                    pruned.insert(path);
                }
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            if ignore.is_match(&file_name) || config.should_skip_hidden(&file_name) {
                if file_type.is_dir() {
                    pruned.insert(path);
                }
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    let kind = if err
                        .io_error()
                        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
                    {
                        WarningKind::PermissionDenied
                    } else {
                        WarningKind::MetadataError
                    };
                    warnings.push(ScanWarning::new(&path, err.to_string(), kind));
                    progress.record_warning();
                    continue;
                }
            };

            if !config.cross_filesystems && get_dev(&metadata) != root_device {
                if file_type.is_dir() {
                    pruned.insert(path);
                }
                continue;
            }

            let kind = if file_type.is_dir() {
                stats.record_dir();
                if progress.record_dir(&path) {
                    self.report(&progress);
                }
                EntryKindInfo::Directory
            } else if file_type.is_file() {
                let inode = InodeInfo::new(get_ino(&metadata), get_dev(&metadata));
                let counted =
                    config.apparent_size || get_nlink(&metadata) <= 1 || inodes.first_link(inode);
                let size = if counted { metadata.len() } else { 0 };

                stats.record_file(size);
                if progress.record_file(&path, size) {
                    self.report(&progress);
                }
                EntryKindInfo::File { size, inode }
            } else if file_type.is_symlink() {
                let target = std::fs::read_link(&path)
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default();
                if !path.exists() {
                    warnings.push(ScanWarning::broken_symlink(&path, &target));
                    progress.record_warning();
                }
                EntryKindInfo::Symlink {
                    target: target.into(),
                }
            } else {
                EntryKindInfo::Other
            };

            entries_by_parent.entry(parent).or_default().push(EntryInfo {
                name: file_name.into(),
                path,
                kind,
            });
        }

        Ok(entries_by_parent)
    }

    fn report(&self, progress: &ProgressTracker) {
        // No subscribers is not an error.
        let _ = self.progress_tx.send(progress.snapshot());
    }
}

impl Default for JwalkScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively build a directory node and roll up its aggregates.
fn build_node(
    path: &Path,
    name: CompactString,
    entries_by_parent: &mut HashMap<PathBuf, Vec<EntryInfo>>,
    node_ids: &AtomicU64,
) -> FileNode {
    let next_id = || NodeId::new(node_ids.fetch_add(1, Ordering::Relaxed));
    let mut node = FileNode::new_directory(next_id(), name);

    let mut size: u64 = 0;
    let mut file_count: u64 = 0;
    let mut dir_count: u64 = 0;

    for entry in entries_by_parent.remove(path).unwrap_or_default() {
        let child = match entry.kind {
            EntryKindInfo::Directory => {
                let child = build_node(&entry.path, entry.name, entries_by_parent, node_ids);
                dir_count += child.dir_count() + 1;
                child
            }
            EntryKindInfo::File { size, inode } => {
                let mut child = FileNode::new_file(next_id(), entry.name, size);
                child.inode = Some(inode);
                child
            }
            EntryKindInfo::Symlink { target } => {
                FileNode::new_symlink(next_id(), entry.name, target)
            }
            EntryKindInfo::Other => FileNode {
                id: next_id(),
                name: entry.name,
                kind: NodeKind::Other,
                size: 0,
                inode: None,
                children: Vec::new(),
            },
        };

        size += child.size;
        file_count += child.file_count();
        node.children.push(child);
    }

    node.size = size;
    node.kind = NodeKind::Directory {
        file_count,
        dir_count,
    };

    // Largest first; stable so equal sizes keep walk (name) order.
    node.children.sort_by(|a, b| b.size.cmp(&a.size));

    node
}

/// Temporary struct for collecting entry information.
struct EntryInfo {
    name: CompactString,
    path: PathBuf,
    kind: EntryKindInfo,
}

enum EntryKindInfo {
    Directory,
    File { size: u64, inode: InodeInfo },
    Symlink { target: CompactString },
    Other,
}

// Cross-platform metadata helpers

#[cfg(unix)]
fn get_dev(metadata: &Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn get_ino(metadata: &Metadata) -> u64 {
    metadata.ino()
}

#[cfg(not(unix))]
fn get_ino(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn get_nlink(metadata: &Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn get_nlink(_metadata: &Metadata) -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let config = ScanConfig::new(temp.path());

        let tree = JwalkScanner::new().scan(&config).unwrap();

        assert_eq!(tree.stats.total_files, 4);
        assert_eq!(tree.stats.total_dirs, 3);
        assert_eq!(tree.root.size, 5 + 17 + 4 + 17);
        assert_eq!(tree.root.file_count(), 4);
        assert_eq!(tree.root.dir_count(), 3);
    }

    #[test]
    fn test_children_sorted_by_size() {
        let temp = create_test_tree();
        let tree = JwalkScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();

        for pair in tree.root.children.windows(2) {
            assert!(pair[0].size >= pair[1].size);
        }
    }

    #[test]
    fn test_ignored_directory_is_pruned() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["dir1".to_string()])
            .build()
            .unwrap();

        let tree = JwalkScanner::new().scan(&config).unwrap();

        assert!(tree.root.child("dir1").is_none());
        assert_eq!(tree.root.size, 5 + 17);
        assert!(!tree.leaves().iter().any(|p| p.contains("file3")));
    }

    #[test]
    fn test_scan_rejects_file_root() {
        let temp = create_test_tree();
        let err = JwalkScanner::new()
            .scan(&ScanConfig::new(temp.path().join("file1.txt")))
            .unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_hardlink_counted_once() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "0123456789").unwrap();
        fs::hard_link(temp.path().join("a"), temp.path().join("b")).unwrap();

        let tree = JwalkScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();
        assert_eq!(tree.root.size, 10);
        assert_eq!(tree.root.file_count(), 2);

        let mut config = ScanConfig::new(temp.path());
        config.apparent_size = true;
        let tree = JwalkScanner::new().scan(&config).unwrap();
        assert_eq!(tree.root.size, 20);
    }
}

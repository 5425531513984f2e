//! JSON snapshots of scanned trees.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use treesplit_core::{FileTree, ScanError};

/// Write a tree as JSON so it can be partitioned elsewhere or later.
pub fn save_snapshot(tree: &FileTree, path: impl AsRef<Path>) -> Result<(), ScanError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| ScanError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, tree).map_err(|e| ScanError::InvalidSnapshot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    writer.flush().map_err(|e| ScanError::io(path, e))
}

/// Read a tree previously written by [`save_snapshot`].
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<FileTree, ScanError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ScanError::InvalidSnapshot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use treesplit_core::{FileNode, NodeId};

    #[test]
    fn test_snapshot_preserves_aggregates() {
        let mut root = FileNode::new_directory(NodeId::new(1), "root");
        root.children.push(FileNode::new_file(NodeId::new(2), "a", 42));
        let tree = FileTree::from_root(root, "/data");

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tree.json");
        save_snapshot(&tree, &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded.total_size(), 42);
        assert_eq!(loaded.leaves(), vec!["a"]);
    }

    #[test]
    fn test_garbage_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tree.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, ScanError::InvalidSnapshot { .. }));
    }
}

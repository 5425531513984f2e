//! File and directory node types.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::aggregate::{EntryKind, Metric};

/// Unique identifier for a node within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Inode information for hardlink detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Type of file system node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory {
        /// Total number of files in this subtree.
        file_count: u64,
        /// Total number of directories in this subtree.
        dir_count: u64,
    },
    /// Symbolic link.
    Symlink {
        /// Link target path.
        target: CompactString,
    },
    /// Other file types (sockets, devices, etc.).
    Other,
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory { .. })
    }
}

impl From<&NodeKind> for EntryKind {
    fn from(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::File => EntryKind::File,
            NodeKind::Directory { .. } => EntryKind::Directory,
            NodeKind::Symlink { .. } => EntryKind::Symlink,
            NodeKind::Other => EntryKind::Other,
        }
    }
}

/// A single file or directory in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    /// Unique identifier for this node.
    pub id: NodeId,

    /// File/directory name (not full path).
    pub name: CompactString,

    /// Node type and associated metadata.
    pub kind: NodeKind,

    /// Size in bytes (aggregate for directories).
    pub size: u64,

    /// Inode info for hardlink detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inode: Option<InodeInfo>,

    /// Children nodes (directories only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Create a new file node.
    pub fn new_file(id: NodeId, name: impl Into<CompactString>, size: u64) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::File,
            size,
            inode: None,
            children: Vec::new(),
        }
    }

    /// Create a new, empty directory node.
    pub fn new_directory(id: NodeId, name: impl Into<CompactString>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Directory {
                file_count: 0,
                dir_count: 0,
            },
            size: 0,
            inode: None,
            children: Vec::new(),
        }
    }

    /// Create a new symlink node. Links contribute no size of their own.
    pub fn new_symlink(
        id: NodeId,
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Symlink {
                target: target.into(),
            },
            size: 0,
            inode: None,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Entry type as seen by aggregate queries.
    pub fn entry_kind(&self) -> EntryKind {
        EntryKind::from(&self.kind)
    }

    /// Get file count for directories, 1 for files.
    pub fn file_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { file_count, .. } => *file_count,
            NodeKind::File => 1,
            _ => 0,
        }
    }

    /// Get directory count for directories.
    pub fn dir_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { dir_count, .. } => *dir_count,
            _ => 0,
        }
    }

    /// Aggregate value of this node for a metric.
    pub fn metric(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Capacity => self.size,
            Metric::Files => self.file_count(),
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Walk down a sequence of child names.
    pub fn descendant<'a, I>(&self, components: I) -> Option<&FileNode>
    where
        I: IntoIterator<Item = &'a str>,
    {
        components
            .into_iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Recompute size and counts of a directory from its children, bottom-up.
    pub fn recompute_aggregates(&mut self) {
        if !self.is_dir() {
            return;
        }

        let mut size = 0;
        let mut files = 0;
        let mut dirs = 0;
        for child in &mut self.children {
            child.recompute_aggregates();
            size += child.size;
            files += child.file_count();
            if child.is_dir() {
                dirs += child.dir_count() + 1;
            }
        }

        self.size = size;
        self.kind = NodeKind::Directory {
            file_count: files,
            dir_count: dirs,
        };
    }

    /// Every leaf below this node as a path relative to it.
    ///
    /// Leaves are non-directories plus empty directories; directories are
    /// rendered with a trailing `/`.
    pub fn leaves(&self) -> Vec<String> {
        let mut out = Vec::new();
        for child in &self.children {
            collect_leaves(child, String::new(), &mut out);
        }
        out
    }
}

fn collect_leaves(node: &FileNode, prefix: String, out: &mut Vec<String>) {
    let mut path = prefix;
    path.push_str(&node.name);
    if !node.is_dir() {
        out.push(path);
        return;
    }

    path.push('/');
    if node.children.is_empty() {
        out.push(path);
        return;
    }
    for child in &node.children {
        collect_leaves(child, path.clone(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_metrics() {
        let node = FileNode::new_file(NodeId::new(1), "a.bin", 1024);
        assert_eq!(node.metric(Metric::Capacity), 1024);
        assert_eq!(node.metric(Metric::Files), 1);
        assert_eq!(node.entry_kind(), EntryKind::File);
    }

    #[test]
    fn test_symlink_counts_nothing() {
        let node = FileNode::new_symlink(NodeId::new(1), "link", "/target");
        assert_eq!(node.metric(Metric::Capacity), 0);
        assert_eq!(node.metric(Metric::Files), 0);
        assert_eq!(node.entry_kind(), EntryKind::Symlink);
    }

    #[test]
    fn test_recompute_aggregates() {
        let mut sub = FileNode::new_directory(NodeId::new(2), "sub");
        sub.children.push(FileNode::new_file(NodeId::new(3), "x", 10));
        sub.children.push(FileNode::new_file(NodeId::new(4), "y", 5));

        let mut root = FileNode::new_directory(NodeId::new(1), "root");
        root.children.push(sub);
        root.children.push(FileNode::new_file(NodeId::new(5), "z", 1));
        root.recompute_aggregates();

        assert_eq!(root.size, 16);
        assert_eq!(root.file_count(), 3);
        assert_eq!(root.dir_count(), 1);
        assert_eq!(root.descendant(["sub", "y"]).map(|n| n.size), Some(5));
        assert!(root.descendant(["sub", "nope"]).is_none());
    }
}

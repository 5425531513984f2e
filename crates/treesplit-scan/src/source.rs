//! Aggregate queries answered from a [`FileTree`].

use std::path::Path;
use std::time::Instant;

use tracing::debug;

use treesplit_core::{
    AggregateSource, DirEntry, DirectorySnapshot, FileNode, FileTree, Metric, ScanError,
    SourceError,
};

use crate::snapshot::load_snapshot;

/// Serves per-directory aggregates out of an in-memory tree.
///
/// Paths are slash-delimited and relative to the tree root, so `/` is the
/// scanned root itself. Children come back largest first for the requested
/// metric (ties by name), and at most `max_entries` are listed; whatever is
/// left over is reported through [`DirectorySnapshot::extra`].
/// [`AggregateSource::aggregate_all`] ignores the cap.
#[derive(Debug, Clone)]
pub struct TreeSource {
    tree: FileTree,
    max_entries: usize,
}

impl TreeSource {
    /// Listing cap used unless configured otherwise.
    pub const DEFAULT_MAX_ENTRIES: usize = 5000;

    /// Create a source over a scanned tree.
    pub fn new(tree: FileTree) -> Self {
        Self {
            tree,
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    /// Load a source from a JSON snapshot written by [`crate::save_snapshot`].
    pub fn from_snapshot(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        Ok(Self::new(load_snapshot(path)?))
    }

    /// Cap the number of children listed per query (0 = unlimited).
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// The tree queries are answered from.
    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    fn resolve(&self, path: &str) -> Result<&FileNode, SourceError> {
        let node = self
            .tree
            .root
            .descendant(path.split('/').filter(|p| !p.is_empty()))
            .ok_or_else(|| SourceError::NotFound {
                path: path.to_string(),
            })?;

        if node.is_dir() {
            Ok(node)
        } else {
            Err(SourceError::NotADirectory {
                path: path.to_string(),
            })
        }
    }

    fn query(
        &self,
        path: &str,
        metric: Metric,
        limit: usize,
    ) -> Result<DirectorySnapshot, SourceError> {
        let start = Instant::now();
        let node = self.resolve(path)?;

        let mut children: Vec<&FileNode> = node.children.iter().collect();
        children.sort_by(|a, b| {
            b.metric(metric)
                .cmp(&a.metric(metric))
                .then_with(|| a.name.cmp(&b.name))
        });

        let entries = children
            .into_iter()
            .take(limit)
            .map(|c| DirEntry::new(c.name.clone(), c.entry_kind(), c.metric(metric)))
            .collect();

        let snapshot = DirectorySnapshot::new(node.metric(metric), entries);
        debug!(
            path,
            %metric,
            listed = snapshot.entries.len(),
            extra = snapshot.extra,
            elapsed_us = start.elapsed().as_micros() as u64,
            "read directory aggregates"
        );
        Ok(snapshot)
    }
}

impl AggregateSource for TreeSource {
    fn aggregate(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        let limit = match self.max_entries {
            0 => usize::MAX,
            n => n,
        };
        self.query(path, metric, limit)
    }

    fn aggregate_all(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        self.query(path, metric, usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesplit_core::{EntryKind, NodeId};

    fn sample_tree() -> FileTree {
        let mut many = FileNode::new_directory(NodeId::new(2), "many");
        for i in 0..5 {
            many.children
                .push(FileNode::new_file(NodeId::new(10 + i), format!("f{i}"), 1));
        }
        let mut root = FileNode::new_directory(NodeId::new(1), "root");
        root.children.push(many);
        root.children.push(FileNode::new_file(NodeId::new(3), "huge", 100));
        FileTree::from_root(root, "/srv")
    }

    #[test]
    fn test_orders_by_metric() {
        let source = TreeSource::new(sample_tree());

        let by_capacity = source.aggregate("/", Metric::Capacity).unwrap();
        assert_eq!(by_capacity.total, 105);
        assert_eq!(by_capacity.entries[0].name.as_str(), "huge");
        assert_eq!(by_capacity.extra, 0);

        let by_files = source.aggregate("/", Metric::Files).unwrap();
        assert_eq!(by_files.total, 6);
        assert_eq!(by_files.entries[0].name.as_str(), "many");
        assert_eq!(by_files.entries[0].kind, EntryKind::Directory);
        assert_eq!(by_files.entries[0].size, 5);
    }

    #[test]
    fn test_capped_listing_reports_extra() {
        let source = TreeSource::new(sample_tree()).with_max_entries(2);
        let snapshot = source.aggregate("/many/", Metric::Capacity).unwrap();

        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.total, 5);
        assert_eq!(snapshot.extra, 3);

        let all = source.aggregate_all("/many/", Metric::Capacity).unwrap();
        assert_eq!(all.entries.len(), 5);
        assert_eq!(all.extra, 0);
    }

    #[test]
    fn test_bad_paths() {
        let source = TreeSource::new(sample_tree());
        assert!(matches!(
            source.aggregate("/nope", Metric::Capacity),
            Err(SourceError::NotFound { .. })
        ));
        assert!(matches!(
            source.aggregate("/huge", Metric::Capacity),
            Err(SourceError::NotADirectory { .. })
        ));
    }
}

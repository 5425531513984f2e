//! Aggregate query model.
//!
//! The partitioner never sees a flat listing of every file. It asks an
//! [`AggregateSource`] for one directory at a time and gets back the
//! directory's rolled-up total plus its immediate children, each carrying the
//! rolled-up total of its own subtree.

use std::collections::HashMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SourceError;

/// Unit used for sizing buckets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Metric {
    /// Bytes used.
    #[default]
    Capacity,
    /// Number of files.
    Files,
}

/// Type of a directory entry as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// One child of a queried directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Name relative to the parent directory.
    pub name: CompactString,
    /// Entry type.
    pub kind: EntryKind,
    /// Aggregate for the configured metric (subtree total for directories).
    pub size: u64,
}

impl DirEntry {
    /// Create a new entry.
    pub fn new(name: impl Into<CompactString>, kind: EntryKind, size: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<CompactString>, size: u64) -> Self {
        Self::new(name, EntryKind::File, size)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<CompactString>, size: u64) -> Self {
        Self::new(name, EntryKind::Directory, size)
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Aggregate response for a single directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Total reported for the directory's whole subtree.
    pub total: u64,
    /// Children in the order the source listed them.
    pub entries: Vec<DirEntry>,
    /// `total` minus the sum of the listed children.
    ///
    /// Positive when the source capped the listing. Negative values mean the
    /// source is inconsistent and must be tolerated.
    pub extra: i64,
}

impl DirectorySnapshot {
    /// Build a snapshot, deriving `extra` from the reported total.
    pub fn new(total: u64, entries: Vec<DirEntry>) -> Self {
        let listed: u128 = entries.iter().map(|e| e.size as u128).sum();
        let delta = total as i128 - listed as i128;
        let extra = delta.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Self {
            total,
            entries,
            extra,
        }
    }

    /// Sum of the sizes of the listed children.
    pub fn listed_total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |sum, e| sum.saturating_add(e.size))
    }

    /// Whether the listed children fit inside the reported total.
    pub fn is_consistent(&self) -> bool {
        self.extra >= 0
    }
}

/// Something that answers per-directory aggregate queries.
///
/// Implementations may cap how many children they list (the rest shows up in
/// [`DirectorySnapshot::extra`]) and may answer from a stale view of a live
/// tree. A failed query is fatal to the caller's run.
pub trait AggregateSource {
    /// Query the aggregate for the directory at `path` (slash-delimited).
    fn aggregate(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError>;

    /// Query with every child listed, ignoring any listing cap.
    ///
    /// Used when each child must be named individually. Sources that never
    /// cap their listings can keep the default.
    fn aggregate_all(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        self.aggregate(path, metric)
    }
}

impl<T: AggregateSource + ?Sized> AggregateSource for &T {
    fn aggregate(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        (**self).aggregate(path, metric)
    }

    fn aggregate_all(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        (**self).aggregate_all(path, metric)
    }
}

impl<T: AggregateSource + ?Sized> AggregateSource for Box<T> {
    fn aggregate(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        (**self).aggregate(path, metric)
    }

    fn aggregate_all(&self, path: &str, metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        (**self).aggregate_all(path, metric)
    }
}

/// Canonical key for a slash-delimited directory path: `/a/b/`.
pub(crate) fn directory_key(path: &str) -> String {
    let mut key = String::from("/");
    for part in path.split('/').filter(|p| !p.is_empty()) {
        key.push_str(part);
        key.push('/');
    }
    key
}

/// Aggregate source backed by pre-recorded responses.
///
/// Every query for a path returns the same recorded snapshot, regardless of
/// the metric asked for. Paths are matched ignoring duplicate or trailing
/// slashes. A path can also be recorded as unreachable, which makes every
/// query for it fail with [`SourceError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    directories: HashMap<String, DirectorySnapshot>,
    unavailable: HashMap<String, String>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory response, deriving `extra` from `total`.
    pub fn with_dir(mut self, path: &str, total: u64, entries: Vec<DirEntry>) -> Self {
        self.insert(path, DirectorySnapshot::new(total, entries));
        self
    }

    /// Record a directory whose total is exactly the sum of its children.
    pub fn with_listing(self, path: &str, entries: Vec<DirEntry>) -> Self {
        let total = entries
            .iter()
            .fold(0u64, |sum, e| sum.saturating_add(e.size));
        self.with_dir(path, total, entries)
    }

    /// Make every query for `path` fail as if the source went away.
    pub fn with_unavailable(mut self, path: &str, message: impl Into<String>) -> Self {
        self.unavailable.insert(directory_key(path), message.into());
        self
    }

    /// Record a snapshot for a path, replacing any previous one.
    pub fn insert(&mut self, path: &str, snapshot: DirectorySnapshot) {
        self.directories.insert(directory_key(path), snapshot);
    }

    /// Number of recorded directories.
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

impl AggregateSource for MemorySource {
    fn aggregate(&self, path: &str, _metric: Metric) -> Result<DirectorySnapshot, SourceError> {
        let key = directory_key(path);
        if let Some(message) = self.unavailable.get(&key) {
            return Err(SourceError::unavailable(path, message.as_str()));
        }
        self.directories
            .get(&key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_extra() {
        let snapshot = DirectorySnapshot::new(
            100,
            vec![DirEntry::file("a", 30), DirEntry::directory("b", 50)],
        );
        assert_eq!(snapshot.extra, 20);
        assert_eq!(snapshot.listed_total(), 80);
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_listed_total_saturates() {
        let snapshot = DirectorySnapshot::new(
            u64::MAX,
            vec![DirEntry::file("a", u64::MAX), DirEntry::file("b", 10)],
        );
        assert_eq!(snapshot.listed_total(), u64::MAX);
        assert_eq!(snapshot.extra, -10);
        assert!(!snapshot.is_consistent());
    }

    #[test]
    fn test_snapshot_negative_extra() {
        let snapshot = DirectorySnapshot::new(10, vec![DirEntry::file("a", 30)]);
        assert_eq!(snapshot.extra, -20);
        assert!(!snapshot.is_consistent());
    }

    #[test]
    fn test_directory_key() {
        assert_eq!(directory_key("/"), "/");
        assert_eq!(directory_key(""), "/");
        assert_eq!(directory_key("/a/b"), "/a/b/");
        assert_eq!(directory_key("a//b/"), "/a/b/");
    }

    #[test]
    fn test_metric_strings() {
        assert_eq!(Metric::Capacity.to_string(), "capacity");
        assert_eq!("files".parse::<Metric>().unwrap(), Metric::Files);
    }

    #[test]
    fn test_memory_source_lookup() {
        let source = MemorySource::new().with_listing("/data", vec![DirEntry::file("x", 5)]);

        let snapshot = source.aggregate("/data/", Metric::Capacity).unwrap();
        assert_eq!(snapshot.total, 5);
        assert_eq!(snapshot.entries.len(), 1);

        let err = source.aggregate("/missing", Metric::Capacity).unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[test]
    fn test_memory_source_unavailable() {
        let source = MemorySource::new()
            .with_listing("/data", vec![DirEntry::file("x", 5)])
            .with_unavailable("/data/", "session expired");

        let err = source.aggregate_all("/data", Metric::Files).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert_eq!(err.path(), "/data");
        assert!(err.to_string().contains("session expired"));
    }
}

//! File system scanning and aggregate sources for treesplit.
//!
//! The partitioner consumes per-directory aggregates. This crate produces
//! them from a local tree:
//!
//! - [`JwalkScanner`] walks a directory in parallel and builds a
//!   [`FileTree`] whose directories carry rolled-up sizes and file counts.
//! - [`TreeSource`] answers [`AggregateSource`] queries from such a tree,
//!   listing children largest first and capping long listings the way a
//!   remote aggregate service does.
//! - [`save_snapshot`] / [`load_snapshot`] move trees between hosts as JSON,
//!   so the scan can run next to the data and the split anywhere.
//!
//! # Example
//!
//! ```rust,no_run
//! use treesplit_scan::{AggregateSource, JwalkScanner, Metric, ScanConfig, TreeSource};
//!
//! let tree = JwalkScanner::new().scan(&ScanConfig::new("/srv/data")).unwrap();
//! let source = TreeSource::new(tree);
//! let root = source.aggregate("/", Metric::Capacity).unwrap();
//! println!("{} bytes in {} listed children", root.total, root.entries.len());
//! ```

mod inode;
mod progress;
mod scanner;
mod snapshot;
mod source;

pub use inode::InodeTracker;
pub use progress::ScanProgress;
pub use scanner::JwalkScanner;
pub use snapshot::{load_snapshot, save_snapshot};
pub use source::TreeSource;

// Re-export core types for convenience
pub use treesplit_core::{
    AggregateSource, DirEntry, DirectorySnapshot, EntryKind, FileNode, FileTree, Metric, NodeId,
    NodeKind, ScanConfig, ScanError, ScanWarning, TreeStats, WarningKind,
};

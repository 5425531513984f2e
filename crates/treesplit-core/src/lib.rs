//! Core types and traits for treesplit.
//!
//! This crate provides the data structures shared by the scanner and the
//! partitioner: scanned file trees, the aggregate query model consumed by the
//! partitioning walk, and configuration/error types.

mod aggregate;
mod config;
mod error;
mod node;
mod tree;

pub use aggregate::{AggregateSource, DirEntry, DirectorySnapshot, EntryKind, MemorySource, Metric};
pub use config::{
    OutputMode, PartitionConfig, PartitionConfigBuilder, PathStyle, ScanConfig, ScanConfigBuilder,
};
pub use error::{ScanError, ScanWarning, SourceError, WarningKind};
pub use node::{FileNode, InodeInfo, NodeId, NodeKind};
pub use tree::{FileTree, TreeStats};

//! Balanced tree partitioning for treesplit.
//!
//! [`Partitioner`] walks a directory tree through an [`AggregateSource`],
//! querying only the directories that do not fit whole into the open bucket,
//! and assigns every entry to exactly one of N buckets of roughly equal size.
//! Each bucket renders either as a flat path list or as ordered `+`/`-`
//! filter rules for rsync's `--filter`/`--include-from` style matching.
//!
//! # Example
//!
//! ```rust
//! use treesplit_core::{DirEntry, MemorySource, PartitionConfig};
//! use treesplit_partition::Partitioner;
//!
//! let source = MemorySource::new().with_listing(
//!     "/",
//!     vec![DirEntry::file("x", 60), DirEntry::file("y", 40)],
//! );
//! let partition = Partitioner::new(&source, PartitionConfig::new(2)).run("/")?;
//!
//! assert_eq!(partition.buckets().len(), 2);
//! assert_eq!(partition.render()[0], vec!["+ /", "+ /x", "- /*"]);
//! # Ok::<(), treesplit_partition::PartitionError>(())
//! ```
//!
//! [`AggregateSource`]: treesplit_core::AggregateSource

mod bucket;
mod error;
mod folder;
mod output;
mod partitioner;
mod report;
mod rules;
mod verify;

pub use bucket::{Bucket, BucketEntry, render_path};
pub use error::{PartitionError, PartitionWarning, PartitionWarningKind};
pub use output::{DEFAULT_RULES_BASENAME, bucket_file_name, write_buckets};
pub use partitioner::{Partition, Partitioner};
pub use report::{BucketSummary, PartitionReport};
pub use rules::{FilterAction, FilterRule, FilterRuleBuilder, RuleSet};
pub use verify::{CoverageReport, DuplicateCoverage, verify_coverage, verify_paths, verify_rules};

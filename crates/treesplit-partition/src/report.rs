//! Serializable run summaries.

use std::path::PathBuf;

use serde::Serialize;

use treesplit_core::{Metric, OutputMode};

use crate::error::PartitionWarning;
use crate::partitioner::Partition;

/// Per-bucket line of a run report.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub used: u64,
    pub capacity: u64,
    pub overflow: u64,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<usize>,
}

/// Summary of a partitioning run, suitable for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub root: String,
    pub metric: Metric,
    pub mode: OutputMode,
    pub requested: usize,
    pub total: u64,
    pub capacity: u64,
    pub buckets: Vec<BucketSummary>,
    pub warnings: Vec<PartitionWarning>,
}

impl PartitionReport {
    /// Summarize a partition. `files` are the written bucket files, in
    /// bucket order, if any were written.
    pub fn new(partition: &Partition, files: &[PathBuf]) -> Self {
        let buckets = partition
            .buckets()
            .iter()
            .enumerate()
            .map(|(i, bucket)| BucketSummary {
                index: bucket.index(),
                file: files.get(i).cloned(),
                used: bucket.used(),
                capacity: bucket.capacity(),
                overflow: bucket.overflow(),
                entries: bucket.entries().len(),
                rules: bucket.rules().map(<[_]>::len),
            })
            .collect();

        Self {
            root: partition.root().to_string(),
            metric: partition.metric(),
            mode: partition.mode(),
            requested: partition.requested(),
            total: partition.total(),
            capacity: partition.capacity(),
            buckets,
            warnings: partition.warnings().to_vec(),
        }
    }
}

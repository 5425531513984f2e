//! Errors and warnings raised while partitioning.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use treesplit_core::SourceError;

/// Errors that abort a partitioning run.
///
/// A run that fails never leaves bucket files behind.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// An aggregate query failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The tree cannot be divided (no buckets requested or nothing to split).
    #[error("Cannot partition: {reason}")]
    DivisionDegenerate { reason: String },

    /// Writing a bucket file failed.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A filter rule could not be parsed or compiled.
    #[error("Invalid filter rule {rule:?}: {message}")]
    InvalidRule { rule: String, message: String },
}

impl PartitionError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::DivisionDegenerate {
            reason: reason.into(),
        }
    }
}

/// Kind of partition warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionWarningKind {
    /// No bucket slot was left for an oversized item; the last bucket was overfilled.
    CapacityExhausted,
    /// A directory's listed children add up to more than its reported total.
    InconsistentAggregate,
    /// Unlisted children could not be written out individually.
    UncoveredExtra,
    /// The walk ended with fewer buckets than requested.
    BucketShortfall,
}

/// Non-fatal condition recorded during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionWarning {
    /// Query path the warning relates to.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: PartitionWarningKind,
}

impl PartitionWarning {
    /// Create a new warning.
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        kind: PartitionWarningKind,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }
}

//! Coverage checks: every leaf in exactly one bucket.

use itertools::Itertools;
use serde::Serialize;

use treesplit_core::OutputMode;

use crate::error::PartitionError;
use crate::partitioner::Partition;
use crate::rules::RuleSet;

/// A leaf claimed by more than one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCoverage {
    pub path: String,
    /// 1-based bucket numbers.
    pub buckets: Vec<usize>,
}

/// Outcome of replaying bucket outputs against a leaf set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    /// Number of leaves checked.
    pub leaves: usize,
    /// Leaves no bucket claims.
    pub uncovered: Vec<String>,
    /// Leaves more than one bucket claims.
    pub duplicated: Vec<DuplicateCoverage>,
}

impl CoverageReport {
    /// Every leaf is claimed exactly once.
    pub fn is_exact(&self) -> bool {
        self.uncovered.is_empty() && self.duplicated.is_empty()
    }

    fn tally<F>(leaves: &[String], buckets: usize, claims: F) -> Self
    where
        F: Fn(usize, &str) -> bool,
    {
        let mut report = Self {
            leaves: leaves.len(),
            ..Self::default()
        };

        for leaf in leaves {
            let owners = (0..buckets)
                .filter(|&i| claims(i, leaf))
                .map(|i| i + 1)
                .collect_vec();
            match owners.len() {
                0 => report.uncovered.push(leaf.clone()),
                1 => {}
                _ => report.duplicated.push(DuplicateCoverage {
                    path: leaf.clone(),
                    buckets: owners,
                }),
            }
        }
        report
    }
}

/// Replay rule sets, one per bucket, against root-relative leaves.
pub fn verify_rules(leaves: &[String], rule_sets: &[RuleSet]) -> CoverageReport {
    CoverageReport::tally(leaves, rule_sets.len(), |i, leaf| rule_sets[i].allows(leaf))
}

/// Check flat path lists, one per bucket, against root-relative leaves.
///
/// A listed directory (trailing `/`) claims everything below it.
pub fn verify_paths(leaves: &[String], lists: &[Vec<String>]) -> CoverageReport {
    CoverageReport::tally(leaves, lists.len(), |i, leaf| {
        lists[i].iter().any(|listed| path_claims(listed, leaf))
    })
}

fn path_claims(listed: &str, leaf: &str) -> bool {
    listed == leaf || (listed.ends_with('/') && leaf.starts_with(listed))
}

/// Check a partition's buckets against the leaves of the tree it was cut from.
pub fn verify_coverage(
    partition: &Partition,
    leaves: &[String],
) -> Result<CoverageReport, PartitionError> {
    match partition.mode() {
        OutputMode::Rules => {
            let rule_sets = partition
                .buckets()
                .iter()
                .map(|bucket| RuleSet::compile(bucket.rules().unwrap_or_default()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(verify_rules(leaves, &rule_sets))
        }
        OutputMode::Paths => {
            let lists = partition
                .buckets()
                .iter()
                .map(|bucket| bucket.entries().iter().map(|e| e.path.clone()).collect_vec())
                .collect_vec();
            Ok(verify_paths(leaves, &lists))
        }
    }
}

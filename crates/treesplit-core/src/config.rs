//! Scan and partition configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::aggregate::Metric;

/// Configuration for scanning a local tree.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Cross filesystem boundaries.
    #[builder(default = "false")]
    #[serde(default)]
    pub cross_filesystems: bool,

    /// Count every hardlink at full size instead of only the first one seen.
    #[builder(default = "false")]
    #[serde(default)]
    pub apparent_size: bool,

    /// Glob patterns matched against entry names; matches are skipped.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of threads for scanning (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

fn default_true() -> bool {
    true
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                Err("Root path cannot be empty".to_string())
            }
            Some(_) => Ok(()),
            None => Err("Root path is required".to_string()),
        }
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            cross_filesystems: false,
            apparent_size: false,
            ignore_patterns: Vec::new(),
            threads: 0,
            include_hidden: true,
        }
    }

    /// Compile the ignore patterns into a single matcher.
    pub fn ignore_matcher(&self) -> Result<GlobSet, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            builder.add(Glob::new(pattern)?);
        }
        builder.build()
    }

    /// Check if hidden files should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// What each bucket file contains.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputMode {
    /// One path per line, relative to the root.
    Paths,
    /// Ordered `+`/`-` filter rules for a first-match-wins copy tool.
    #[default]
    Rules,
}

/// How flat-mode paths are rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStyle {
    /// Slash-delimited, relative to the partition root.
    #[default]
    Posix,
    /// Backslash-delimited, prefixed with a UNC share such as `\\server\share`.
    Windows { prefix: String },
}

/// Configuration for a partitioning run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct PartitionConfig {
    /// Number of buckets to split the tree into.
    pub buckets: usize,

    /// Aggregate used to size buckets.
    #[builder(default)]
    #[serde(default)]
    pub metric: Metric,

    /// Output rendering.
    #[builder(default)]
    #[serde(default)]
    pub mode: OutputMode,

    /// Claim a directory's whole remainder with one wildcard include when it fits.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub wildcards: bool,

    /// Path rendering for flat mode.
    #[builder(default)]
    #[serde(default)]
    pub path_style: PathStyle,
}

impl PartitionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.buckets {
            Some(0) => Err("Bucket count must be at least 1".to_string()),
            Some(_) => Ok(()),
            None => Err("Bucket count is required".to_string()),
        }
    }
}

impl PartitionConfig {
    /// Create a new partition config builder.
    pub fn builder() -> PartitionConfigBuilder {
        PartitionConfigBuilder::default()
    }

    /// Create a config with defaults for everything but the bucket count.
    pub fn new(buckets: usize) -> Self {
        Self {
            buckets,
            metric: Metric::default(),
            mode: OutputMode::default(),
            wildcards: true,
            path_style: PathStyle::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user")
            .threads(4usize)
            .follow_symlinks(true)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.threads, 4);
        assert!(config.follow_symlinks);
    }

    #[test]
    fn test_scan_config_requires_root() {
        assert!(ScanConfig::builder().build().is_err());
        assert!(ScanConfig::builder().root("").build().is_err());
    }

    #[test]
    fn test_ignore_matcher() {
        let config = ScanConfig::builder()
            .root("/test")
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string()])
            .build()
            .unwrap();

        let matcher = config.ignore_matcher().unwrap();
        assert!(matcher.is_match("node_modules"));
        assert!(matcher.is_match("test.log"));
        assert!(!matcher.is_match("src"));
    }

    #[test]
    fn test_partition_config_defaults() {
        let config = PartitionConfig::builder().buckets(4usize).build().unwrap();

        assert_eq!(config.buckets, 4);
        assert_eq!(config.metric, Metric::Capacity);
        assert_eq!(config.mode, OutputMode::Rules);
        assert!(config.wildcards);
        assert_eq!(config.path_style, PathStyle::Posix);
    }

    #[test]
    fn test_partition_config_rejects_zero_buckets() {
        let err = PartitionConfig::builder().buckets(0usize).build().unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_output_mode_parse() {
        assert_eq!("paths".parse::<OutputMode>().unwrap(), OutputMode::Paths);
        assert_eq!(OutputMode::Rules.to_string(), "rules");
    }
}

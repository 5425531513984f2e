//! Capacity-bounded output buckets.

use serde::Serialize;

use treesplit_core::{OutputMode, PathStyle};

use crate::rules::{FilterRule, FilterRuleBuilder};

/// One claimed item: a root-relative path and the metric it was charged.
///
/// Directories end in `/`. In rule mode a remainder claim ends in `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketEntry {
    pub path: String,
    pub size: u64,
}

/// An output partition with a fixed capacity.
///
/// Once the walk moves past a bucket it is closed and never written to again.
#[derive(Debug)]
pub struct Bucket {
    index: usize,
    capacity: u64,
    used: u64,
    entries: Vec<BucketEntry>,
    filter: Option<FilterRuleBuilder>,
    closed: bool,
}

impl Bucket {
    /// Create bucket number `index` (1-based).
    pub fn new(index: usize, capacity: u64, mode: OutputMode) -> Self {
        let filter = match mode {
            OutputMode::Rules => Some(FilterRuleBuilder::new()),
            OutputMode::Paths => None,
        };
        Self {
            index,
            capacity,
            used: 0,
            entries: Vec::new(),
            filter,
            closed: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Capacity still free, zero once overfilled.
    pub fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }

    /// How far past capacity the bucket was filled.
    pub fn overflow(&self) -> u64 {
        self.used.saturating_sub(self.capacity)
    }

    /// Whether an item of `size` fits without overfilling.
    pub fn fits(&self, size: u64) -> bool {
        size <= self.remaining()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn entries(&self) -> &[BucketEntry] {
        &self.entries
    }

    /// Filter rules, when the bucket was created in rule mode.
    pub fn rules(&self) -> Option<&[FilterRule]> {
        self.filter.as_ref().map(FilterRuleBuilder::rules)
    }

    pub(crate) fn filter_mut(&mut self) -> Option<&mut FilterRuleBuilder> {
        self.filter.as_mut()
    }

    /// Record a claimed item and charge its size.
    pub fn add(&mut self, path: impl Into<String>, size: u64) {
        debug_assert!(!self.closed, "bucket {} already closed", self.index);
        self.used = self.used.saturating_add(size);
        self.entries.push(BucketEntry {
            path: path.into(),
            size,
        });
    }

    /// Charge size that has no entry of its own.
    pub(crate) fn charge(&mut self, size: u64) {
        debug_assert!(!self.closed, "bucket {} already closed", self.index);
        self.used = self.used.saturating_add(size);
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Output lines: filter rules in rule mode, one path per entry otherwise.
    pub fn render(&self, style: &PathStyle) -> Vec<String> {
        match &self.filter {
            Some(filter) => filter.rules().iter().map(ToString::to_string).collect(),
            None => self
                .entries
                .iter()
                .map(|entry| render_path(&entry.path, style))
                .collect(),
        }
    }
}

/// Render a root-relative path in the requested style.
pub fn render_path(path: &str, style: &PathStyle) -> String {
    match style {
        PathStyle::Posix => path.to_string(),
        PathStyle::Windows { prefix } => {
            let prefix = prefix.trim_end_matches('\\');
            format!("{prefix}\\{}", path.replace('/', "\\"))
        }
    }
}

//! Hardlink bookkeeping.

use dashmap::DashSet;
use treesplit_core::InodeInfo;

/// Remembers which (inode, device) pairs have already been sized.
///
/// Only the first link to a multiply-linked file carries its size; later
/// links are recorded at zero so the tree total matches what a copy tool
/// preserving hardlinks actually moves.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: DashSet<InodeInfo>,
}

impl InodeTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time an inode is offered.
    pub fn first_link(&self, info: InodeInfo) -> bool {
        self.seen.insert(info)
    }

    /// Number of distinct inodes recorded.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

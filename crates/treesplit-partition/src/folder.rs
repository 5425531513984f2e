//! Consumption cursor over one directory snapshot.

use treesplit_core::{DirEntry, DirectorySnapshot};

/// The unconsumed part of a queried directory.
///
/// Entries are held as a stack so that popping yields them in the order the
/// source listed them.
#[derive(Debug)]
pub(crate) struct Folder {
    pending: Vec<DirEntry>,
    listed: u64,
    extra: i64,
    reclaimed: bool,
}

impl Folder {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        let listed = snapshot.listed_total();
        let mut pending = snapshot.entries;
        pending.reverse();
        Self {
            pending,
            listed,
            extra: snapshot.extra,
            reclaimed: false,
        }
    }

    /// Take the next entry in listing order.
    pub fn pop(&mut self) -> Option<DirEntry> {
        let entry = self.pending.pop()?;
        self.listed = self.listed.saturating_sub(entry.size);
        Some(entry)
    }

    /// Return a popped entry so the remainder include claims it.
    pub fn reclaim(&mut self, entry: DirEntry) {
        self.listed = self.listed.saturating_add(entry.size);
        self.pending.push(entry);
        self.reclaimed = true;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_reclaimed(&self) -> bool {
        self.reclaimed
    }

    pub fn extra(&self) -> i64 {
        self.extra
    }

    /// Unconsumed children plus unlisted extra, never below zero.
    pub fn remaining_total(&self) -> u64 {
        let total = self.listed as i128 + self.extra as i128;
        total.clamp(0, u64::MAX as i128) as u64
    }

    /// Unconsumed children in listing order.
    pub fn pending(&self) -> impl Iterator<Item = &DirEntry> {
        self.pending.iter().rev()
    }
}

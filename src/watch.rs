//! Watch table: which processes, and which event kinds, are of interest.
//!
//! The kernel broadcasts every process event on the host, so this table is
//! the only filter between the socket and the subscriber queues. A single
//! mutex guards the whole map; every operation holds it only for one lookup
//! or update.

use std::sync::{Mutex, MutexGuard};

use ahash::AHashMap as HashMap;
use tracing::debug;

use crate::error::WatchError;
use crate::event::{Pid, ANY};

/// Thread-safe map of pid (or [`ANY`]) to interest bitmask.
#[derive(Debug, Default)]
pub struct WatchTable {
    entries: Mutex<HashMap<Pid, u32>>,
}

impl WatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Pid, u32>> {
        // The map holds plain integers, so a poisoned lock is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Merges `mask` into the entry for `pid`, creating it if needed.
    pub fn subscribe(&self, pid: Pid, mask: u32) {
        let mut entries = self.lock();
        let flags = entries.entry(pid).or_insert(0);
        *flags |= mask;
        debug!("Watching pid={} flags={:#010x}", pid, *flags);
    }

    /// Removes the entry for `pid`.
    pub fn unsubscribe(&self, pid: Pid) -> Result<(), WatchError> {
        match self.lock().remove(&pid) {
            Some(_) => {
                debug!("Removed watch for pid={}", pid);
                Ok(())
            }
            None => Err(WatchError::NotWatched(pid)),
        }
    }

    /// True if the explicit entry for `pid` (or, without one, the wildcard
    /// entry) has every bit of `kind` set.
    pub fn is_watching(&self, pid: Pid, kind: u32) -> bool {
        Self::effective_mask(&self.lock(), pid).is_some_and(|flags| flags & kind == kind)
    }

    /// The mask that applies to `pid`: its own entry, else the wildcard.
    pub fn mask_for(&self, pid: Pid) -> Option<u32> {
        Self::effective_mask(&self.lock(), pid)
    }

    fn effective_mask(entries: &HashMap<Pid, u32>, pid: Pid) -> Option<u32> {
        entries.get(&pid).or_else(|| entries.get(&ANY)).copied()
    }

    /// Extends a watch from `parent` to `child` if the parent's effective
    /// entry has every bit of `follow_kind` set. The child receives the
    /// parent's (or wildcard's) full mask, merged into any entry it already
    /// has. Returns whether the child is now watched this way.
    ///
    /// Check and insert happen under one lock acquisition.
    pub fn follow_fork(&self, parent: Pid, child: Pid, follow_kind: u32) -> bool {
        let mut entries = self.lock();
        let Some(flags) = Self::effective_mask(&entries, parent) else {
            return false;
        };
        if flags & follow_kind != follow_kind {
            return false;
        }
        *entries.entry(child).or_insert(0) |= flags;
        debug!(
            "Following fork {} -> {} with flags={:#010x}",
            parent, child, flags
        );
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

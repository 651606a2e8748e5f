//! Listener counters.
//!
//! Updated by the read loop with relaxed atomics and read from any thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ListenerStats {
    pub datagrams_received: AtomicU64,
    /// Netlink messages dropped without error: wrong type, wrong connector id,
    /// unknown or unrouted event kind.
    pub messages_ignored: AtomicU64,
    pub events_emitted: AtomicU64,
    pub errors_published: AtomicU64,
    pub forks_followed: AtomicU64,
    /// Watches removed by exit, uid/gid or sid events.
    pub watches_expired: AtomicU64,
}

/// Point-in-time copy of [`ListenerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub datagrams_received: u64,
    pub messages_ignored: u64,
    pub events_emitted: u64,
    pub errors_published: u64,
    pub forks_followed: u64,
    pub watches_expired: u64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            errors_published: self.errors_published.load(Ordering::Relaxed),
            forks_followed: self.forks_followed.load(Ordering::Relaxed),
            watches_expired: self.watches_expired.load(Ordering::Relaxed),
        }
    }
}

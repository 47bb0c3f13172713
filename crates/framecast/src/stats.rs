//! Relay counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of the relay counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub uploads_accepted: u64,
    pub uploads_rejected: u64,
    /// Full images returned by the conditional and still modes
    pub stills_served: u64,
    /// 304 responses in conditional mode
    pub not_modified: u64,
    /// Push subscribers currently streaming
    pub viewers_active: usize,
    /// Push subscribers ever accepted
    pub viewers_total: u64,
    /// Multipart parts written across all push subscribers
    pub parts_pushed: u64,
}

/// Lock-free counters, updated on the request path
#[derive(Debug, Default)]
pub struct AtomicRelayStats {
    pub(crate) uploads_accepted: AtomicU64,
    pub(crate) uploads_rejected: AtomicU64,
    pub(crate) stills_served: AtomicU64,
    pub(crate) not_modified: AtomicU64,
    pub(crate) viewers_active: AtomicUsize,
    pub(crate) viewers_total: AtomicU64,
    pub(crate) parts_pushed: AtomicU64,
}

impl AtomicRelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all atomics and return a plain snapshot
    pub fn snapshot(&self) -> RelayStats {
        RelayStats {
            uploads_accepted: self.uploads_accepted.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            stills_served: self.stills_served.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            viewers_active: self.viewers_active.load(Ordering::Relaxed),
            viewers_total: self.viewers_total.load(Ordering::Relaxed),
            parts_pushed: self.parts_pushed.load(Ordering::Relaxed),
        }
    }

    /// Number of push subscribers currently holding a timer
    pub fn viewers_active(&self) -> usize {
        self.viewers_active.load(Ordering::Relaxed)
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = AtomicRelayStats::new();
        assert_eq!(stats.snapshot(), RelayStats::default());

        AtomicRelayStats::incr(&stats.uploads_accepted);
        AtomicRelayStats::incr(&stats.uploads_accepted);
        AtomicRelayStats::incr(&stats.not_modified);
        stats.viewers_active.fetch_add(1, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.uploads_accepted, 2);
        assert_eq!(snap.not_modified, 1);
        assert_eq!(snap.viewers_active, 1);
        assert_eq!(stats.viewers_active(), 1);
    }
}

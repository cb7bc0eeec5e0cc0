//! Statistics tracking for the relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counters shared by both transports.
pub struct Stats {
    started: Instant,
    pub sessions_total: AtomicU64,
    pub sessions_active: AtomicU64,
    pub sessions_failed: AtomicU64,
    /// Bytes relayed client -> upstream.
    pub bytes_up: AtomicU64,
    /// Bytes relayed upstream -> client.
    pub bytes_down: AtomicU64,
    pub dns_forwarded: AtomicU64,
    pub dns_answered: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
            dns_forwarded: AtomicU64::new(0),
            dns_answered: AtomicU64::new(0),
        }
    }

    /// Count a new TCP session as live until the returned guard drops.
    pub fn open_session(self: &Arc<Self>) -> SessionGuard {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
        SessionGuard {
            stats: Arc::clone(self),
        }
    }

    pub fn active_sessions(&self) -> u64 {
        self.sessions_active.load(Ordering::Relaxed)
    }

    pub fn record_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self, up: u64, down: u64) {
        self.bytes_up.fetch_add(up, Ordering::Relaxed);
        self.bytes_down.fetch_add(down, Ordering::Relaxed);
    }

    pub fn record_dns_forwarded(&self) {
        self.dns_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dns_answered(&self) {
        self.dns_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
            dns_forwarded: self.dns_forwarded.load(Ordering::Relaxed),
            dns_answered: self.dns_answered.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one live TCP session.
pub struct SessionGuard {
    stats: Arc<Stats>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.stats.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub sessions_failed: u64,
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub dns_forwarded: u64,
    pub dns_answered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_guard_tracks_live_sessions() {
        let stats = Arc::new(Stats::new());

        let first = stats.open_session();
        let second = stats.open_session();
        assert_eq!(stats.active_sessions(), 2);

        drop(first);
        assert_eq!(stats.active_sessions(), 1);
        drop(second);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sessions_active, 0);
        assert_eq!(snapshot.sessions_total, 2);
    }

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();

        stats.record_relayed(10, 20);
        stats.record_relayed(1, 2);
        stats.record_failed();
        stats.record_dns_forwarded();
        stats.record_dns_answered();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_up, 11);
        assert_eq!(snapshot.bytes_down, 22);
        assert_eq!(snapshot.sessions_failed, 1);
        assert_eq!(snapshot.dns_forwarded, 1);
        assert_eq!(snapshot.dns_answered, 1);
    }
}

//! Statistics and metrics for relay connections

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Relay-wide counters, shared by all connection tasks
#[derive(Debug)]
pub struct ConnectionCounters {
    total: AtomicU64,
    active: AtomicU64,
    started_at: Instant,
}

impl ConnectionCounters {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            active: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a newly accepted connection
    pub fn on_open(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed connection
    pub fn on_close(&self) {
        // Saturate rather than wrap if a close is ever double counted
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Connections accepted since start
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Connections currently open
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Time since the counters were created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for ConnectionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time relay statistics, as reported by ping and the heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Registered producers
    pub producers: usize,
    /// Registered consumers
    pub consumers: usize,
    /// Open transport connections (including undeclared ones)
    pub active_connections: u64,
    /// Connections accepted since start
    pub total_connections: u64,
    /// Uptime in whole seconds
    pub uptime_secs: u64,
}

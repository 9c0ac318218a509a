//! Per-connection metrics
//!
//! Each connection manager owns one [`ConnectionMetrics`]; counters are plain
//! atomics so the pinger, the poller and the callback dispatcher can update
//! them without coordination.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one connection
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    // Heartbeat
    pings_sent: AtomicU64,
    ping_failures: AtomicU64,
    last_ping_ok: Mutex<Option<DateTime<Utc>>>,

    // Loops
    pinger_starts: AtomicU64,
    poller_starts: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,

    // State machine
    state_transitions: AtomicU64,

    // Requests issued by the user
    requests: AtomicU64,
    request_failures: AtomicU64,

    // Inbound callbacks
    updates_dispatched: AtomicU64,
    update_failures: AtomicU64,
    callback_pings: AtomicU64,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ping_ok(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
        *self.last_ping_ok.lock() = Some(Utc::now());
    }

    pub fn record_ping_failure(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
        self.ping_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pinger_start(&self) {
        self.pinger_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poller_start(&self) {
        self.poller_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.request_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_update(&self, success: bool) {
        self.updates_dispatched.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.update_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_callback_ping(&self) {
        self.callback_pings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            heartbeat: HeartbeatMetrics {
                pings_sent: self.pings_sent.load(Ordering::Relaxed),
                ping_failures: self.ping_failures.load(Ordering::Relaxed),
                last_ping_ok: *self.last_ping_ok.lock(),
            },
            recovery: RecoveryMetrics {
                pinger_starts: self.pinger_starts.load(Ordering::Relaxed),
                poller_starts: self.poller_starts.load(Ordering::Relaxed),
                reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
                reconnects: self.reconnects.load(Ordering::Relaxed),
                state_transitions: self.state_transitions.load(Ordering::Relaxed),
            },
            traffic: TrafficMetrics {
                requests: self.requests.load(Ordering::Relaxed),
                request_failures: self.request_failures.load(Ordering::Relaxed),
                updates_dispatched: self.updates_dispatched.load(Ordering::Relaxed),
                update_failures: self.update_failures.load(Ordering::Relaxed),
                callback_pings: self.callback_pings.load(Ordering::Relaxed),
            },
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub heartbeat: HeartbeatMetrics,
    pub recovery: RecoveryMetrics,
    pub traffic: TrafficMetrics,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatMetrics {
    pub pings_sent: u64,
    pub ping_failures: u64,
    pub last_ping_ok: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryMetrics {
    pub pinger_starts: u64,
    pub poller_starts: u64,
    pub reconnect_attempts: u64,
    pub reconnects: u64,
    pub state_transitions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficMetrics {
    pub requests: u64,
    pub request_failures: u64,
    pub updates_dispatched: u64,
    pub update_failures: u64,
    pub callback_pings: u64,
}

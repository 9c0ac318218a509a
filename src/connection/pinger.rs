//! Heartbeat loop: pings the server while the connection is ALIVE

use super::worker::{LoopControl, LoopTicket};
use crate::error::{ClientError, ClientResult};
use crate::observability::metrics::ConnectionMetrics;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Shortest allowed interval between pings
pub const MIN_PING_INTERVAL_MS: u64 = 5000;

/// What the pinger pings and whom it tells when a ping fails
#[async_trait]
pub trait HeartbeatTarget: Send + Sync {
    async fn heartbeat(&self) -> ClientResult<()>;

    /// Called once, after the pinger has already stopped itself
    async fn heartbeat_failed(&self, error: ClientError);
}

pub struct Pinger {
    sleep_millis: u64,
    control: Arc<LoopControl>,
    metrics: Arc<ConnectionMetrics>,
}

impl Pinger {
    /// A non-positive interval disables the pinger; small ones are raised to the minimum
    pub fn new(requested_millis: i64, metrics: Arc<ConnectionMetrics>) -> Self {
        let sleep_millis = if requested_millis <= 0 {
            0
        } else {
            (requested_millis as u64).max(MIN_PING_INTERVAL_MS)
        };
        Self {
            sleep_millis,
            control: Arc::new(LoopControl::new("pinger")),
            metrics,
        }
    }

    pub fn sleep_millis(&self) -> u64 {
        self.sleep_millis
    }

    pub fn is_configured_to_work(&self) -> bool {
        self.sleep_millis > 0
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Start pinging; false if disabled or already running
    pub fn start(&self, target: Weak<dyn HeartbeatTarget>) -> bool {
        if !self.is_configured_to_work() {
            debug!("Pinger disabled, not starting");
            return false;
        }
        let control = self.control.clone();
        let metrics = self.metrics.clone();
        let sleep_millis = self.sleep_millis;
        let started = self.control.start(move |ticket| {
            run_pinger(ticket, control, target, sleep_millis, metrics)
        });
        if started {
            self.metrics.record_pinger_start();
        }
        started
    }

    /// Request the loop to stop; true if it was running
    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    /// Stop and wait for the loop to finish
    pub async fn shutdown(&self) -> bool {
        self.control.shutdown().await
    }
}

async fn run_pinger(
    mut ticket: LoopTicket,
    control: Arc<LoopControl>,
    target: Weak<dyn HeartbeatTarget>,
    sleep_millis: u64,
    metrics: Arc<ConnectionMetrics>,
) {
    debug!(sleep_millis, "Pinger running");
    loop {
        if !ticket.sleep(sleep_millis).await {
            debug!("Pinger stopped");
            return;
        }
        let Some(target) = target.upgrade() else {
            return;
        };

        let outcome = tokio::select! {
            _ = ticket.cancelled() => {
                debug!("Pinger stopped during ping");
                return;
            }
            outcome = target.heartbeat() => outcome,
        };

        match outcome {
            Ok(()) => metrics.record_ping_ok(),
            Err(err) => {
                metrics.record_ping_failure();
                if control.release(ticket.id()) {
                    warn!(error = %err, "Ping failed, connection lost");
                    target.heartbeat_failed(err).await;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedTarget {
        pings: AtomicUsize,
        fail_after: Option<usize>,
        failures: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HeartbeatTarget for ScriptedTarget {
        async fn heartbeat(&self) -> ClientResult<()> {
            let n = self.pings.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_after {
                Some(limit) if n > limit => Err(ClientError::internal_error("server gone")),
                _ => Ok(()),
            }
        }

        async fn heartbeat_failed(&self, error: ClientError) {
            self.failures.lock().push(error.to_string());
        }
    }

    fn pinger(millis: i64) -> Pinger {
        Pinger::new(millis, Arc::new(ConnectionMetrics::new()))
    }

    #[test]
    fn test_interval_floor_and_disable() {
        assert_eq!(pinger(100).sleep_millis(), MIN_PING_INTERVAL_MS);
        assert_eq!(pinger(10_000).sleep_millis(), 10_000);
        assert!(!pinger(0).is_configured_to_work());
        assert!(!pinger(-5).is_configured_to_work());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_pinger_does_not_start() {
        let target: Arc<dyn HeartbeatTarget> = Arc::new(ScriptedTarget::default());
        let pinger = pinger(0);

        assert!(!pinger.start(Arc::downgrade(&target)));
        assert!(!pinger.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_idempotent() {
        let target: Arc<dyn HeartbeatTarget> = Arc::new(ScriptedTarget::default());
        let pinger = pinger(5000);

        assert!(pinger.start(Arc::downgrade(&target)));
        assert!(!pinger.start(Arc::downgrade(&target)));
        assert!(pinger.stop());
        assert!(!pinger.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_until_failure_then_reports_once() {
        // Arrange
        let scripted = Arc::new(ScriptedTarget {
            fail_after: Some(2),
            ..Default::default()
        });
        let target: Arc<dyn HeartbeatTarget> = scripted.clone();
        let pinger = pinger(5000);

        // Act
        pinger.start(Arc::downgrade(&target));
        tokio::time::sleep(Duration::from_millis(16_000)).await;

        // Assert
        assert_eq!(scripted.pings.load(Ordering::SeqCst), 3);
        assert_eq!(scripted.failures.lock().len(), 1);
        assert!(!pinger.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_pinging() {
        let scripted = Arc::new(ScriptedTarget::default());
        let target: Arc<dyn HeartbeatTarget> = scripted.clone();
        let pinger = pinger(5000);

        pinger.start(Arc::downgrade(&target));
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert!(pinger.shutdown().await);
        tokio::time::sleep(Duration::from_millis(20_000)).await;

        assert_eq!(scripted.pings.load(Ordering::SeqCst), 1);
        assert!(scripted.failures.lock().is_empty());
    }
}

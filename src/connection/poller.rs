//! Reconnect loop: polls the server while the connection is POLLING

use super::health_monitor::{HealthMonitor, ReconnectionDecision};
use super::worker::{LoopControl, LoopTicket};
use crate::error::ClientResult;
use crate::observability::metrics::ConnectionMetrics;
use crate::session::SessionDescriptor;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Shortest allowed delay between reconnect attempts
pub const MIN_RETRY_DELAY_MS: u64 = 4000;

/// What the poller reconnects and whom it reports to
#[async_trait]
pub trait ReconnectTarget: Send + Sync {
    async fn try_reconnect(&self) -> ClientResult<SessionDescriptor>;

    /// A new session exists; the poller has already stopped itself
    async fn reconnected(&self, session: SessionDescriptor);

    /// The configured attempt limit was reached
    async fn reconnect_abandoned(&self, attempts: u32);
}

pub struct Poller {
    sleep_millis: u64,
    max_retries: Option<u32>,
    control: Arc<LoopControl>,
    metrics: Arc<ConnectionMetrics>,
}

impl Poller {
    /// Delays below the minimum are raised; `max_retries` of `None` retries forever
    pub fn new(
        requested_millis: i64,
        max_retries: Option<u32>,
        metrics: Arc<ConnectionMetrics>,
    ) -> Self {
        let sleep_millis = if requested_millis <= 0 {
            MIN_RETRY_DELAY_MS
        } else {
            (requested_millis as u64).max(MIN_RETRY_DELAY_MS)
        };
        Self {
            sleep_millis,
            max_retries,
            control: Arc::new(LoopControl::new("poller")),
            metrics,
        }
    }

    pub fn sleep_millis(&self) -> u64 {
        self.sleep_millis
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Start polling; false if already running
    pub fn start(&self, target: Weak<dyn ReconnectTarget>) -> bool {
        let control = self.control.clone();
        let metrics = self.metrics.clone();
        let sleep_millis = self.sleep_millis;
        let max_retries = self.max_retries;
        let started = self.control.start(move |ticket| {
            run_poller(ticket, control, target, sleep_millis, max_retries, metrics)
        });
        if started {
            self.metrics.record_poller_start();
        }
        started
    }

    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    pub async fn shutdown(&self) -> bool {
        self.control.shutdown().await
    }
}

async fn run_poller(
    mut ticket: LoopTicket,
    control: Arc<LoopControl>,
    target: Weak<dyn ReconnectTarget>,
    sleep_millis: u64,
    max_retries: Option<u32>,
    metrics: Arc<ConnectionMetrics>,
) {
    debug!(sleep_millis, ?max_retries, "Poller running");
    let mut attempts: u32 = 0;

    loop {
        match HealthMonitor::should_attempt_reconnection(
            attempts,
            max_retries,
            ticket.is_cancelled(),
        ) {
            ReconnectionDecision::Proceed { attempt } => attempts = attempt,
            ReconnectionDecision::AbortShutdownRequested => return,
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                if control.release(ticket.id()) {
                    if let Some(target) = target.upgrade() {
                        target.reconnect_abandoned(attempts).await;
                    }
                }
                return;
            }
        }

        if !ticket.sleep(sleep_millis).await {
            debug!("Poller stopped");
            return;
        }
        let Some(target) = target.upgrade() else {
            return;
        };

        metrics.record_reconnect_attempt();
        let outcome = tokio::select! {
            _ = ticket.cancelled() => {
                debug!("Poller stopped during reconnect attempt");
                return;
            }
            outcome = target.try_reconnect() => outcome,
        };

        match outcome {
            Ok(session) => {
                info!(attempt = attempts, "Reconnect attempt succeeded");
                // Reported even when stopped meanwhile so the target can drop the session
                control.release(ticket.id());
                target.reconnected(session).await;
                return;
            }
            Err(err) => {
                warn!(attempt = attempts, error = %err, "Reconnect attempt failed");
            }
        }
    }
}

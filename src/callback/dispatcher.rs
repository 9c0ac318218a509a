//! Routes server callbacks to the handler registered for a callback session
//!
//! The registry belongs to one dispatcher instance; there is no process-wide
//! table. Handlers run on their own task so that a panicking handler is
//! turned into an error reply instead of tearing down the caller.

use crate::codec::qos::ACK_OK_QOS;
use crate::codec::MsgUnit;
use crate::connection::health_monitor::{HealthMonitor, ServerHealth};
use crate::error::{ClientError, ClientResult, ErrorCode};
use crate::observability::metrics::ConnectionMetrics;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn, Instrument};

/// User code receiving messages the server pushes to this client
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Returns the acknowledging QoS, usually `<qos><state id='OK'/></qos>`
    async fn update(&self, cb_session_id: &str, msg: MsgUnit) -> ClientResult<String>;
}

pub struct CallbackDispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn UpdateHandler>>>,
    last_heard: Mutex<Option<Instant>>,
    metrics: Arc<ConnectionMetrics>,
}

impl CallbackDispatcher {
    pub fn new(metrics: Arc<ConnectionMetrics>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            last_heard: Mutex::new(None),
            metrics,
        }
    }

    /// Register the handler for a callback session, replacing any previous one
    pub fn register<S: Into<String>>(&self, cb_session_id: S, handler: Arc<dyn UpdateHandler>) {
        let replaced = self
            .handlers
            .write()
            .insert(cb_session_id.into(), handler)
            .is_some();
        debug!(replaced, "Update handler registered");
    }

    pub fn unregister(&self, cb_session_id: &str) -> bool {
        self.handlers.write().remove(cb_session_id).is_some()
    }

    pub fn is_registered(&self, cb_session_id: &str) -> bool {
        self.handlers.read().contains_key(cb_session_id)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver one message and return the QoS the server gets back
    pub async fn update(
        &self,
        cb_session_id: &str,
        key: &str,
        content: Bytes,
        qos: &str,
    ) -> ClientResult<String> {
        self.touch();
        let span = crate::dispatch_span!(bytes = content.len());
        let result = self
            .dispatch(cb_session_id, key, content, qos)
            .instrument(span)
            .await;
        self.metrics.record_update(result.is_ok());
        result
    }

    /// Deliver without a reply; failures are only logged
    pub async fn update_oneway(&self, cb_session_id: &str, key: &str, content: Bytes, qos: &str) {
        if let Err(err) = self.update(cb_session_id, key, content, qos).await {
            warn!(error_code = %err.error_code(), error = %err, "Oneway update dropped");
        }
    }

    /// Answer the server's callback ping
    pub fn ping(&self, _qos: &str) -> String {
        self.touch();
        self.metrics.record_callback_ping();
        ACK_OK_QOS.to_string()
    }

    /// Time since the server last reached us through the callback
    pub fn since_last_heard(&self) -> Option<Duration> {
        self.last_heard.lock().map(|at| at.elapsed())
    }

    pub fn server_health(&self, ping_interval: Duration) -> ServerHealth {
        HealthMonitor::assess_server_health(self.since_last_heard(), ping_interval)
    }

    fn touch(&self) {
        *self.last_heard.lock() = Some(Instant::now());
    }

    async fn dispatch(
        &self,
        cb_session_id: &str,
        key: &str,
        content: Bytes,
        qos: &str,
    ) -> ClientResult<String> {
        let handler = self.handlers.read().get(cb_session_id).cloned();
        let Some(handler) = handler else {
            warn!("Update for unknown callback session rejected");
            return Err(ClientError::update(
                ErrorCode::UserUpdateAccessDenied,
                "callback session id is not known to this client",
            ));
        };

        let msg = MsgUnit::decode(key, content, qos).map_err(|err| {
            ClientError::update(
                ErrorCode::UserUpdateIllegalArgument,
                format!("update message could not be decoded: {err}"),
            )
        })?;
        let oid = msg.key_oid().to_string();

        let cb_session_id = cb_session_id.to_string();
        let task = tokio::spawn(async move { handler.update(&cb_session_id, msg).await });

        match task.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => {
                warn!(oid = %oid, error = %err, "Update handler failed");
                Err(ClientError::update(
                    ErrorCode::UserUpdateError,
                    format!("update handler failed: {err}"),
                ))
            }
            Err(join_err) => {
                error!(oid = %oid, "Update handler panicked: {}", join_err);
                Err(ClientError::update(
                    ErrorCode::UserUpdateInternalError,
                    "update handler panicked",
                ))
            }
        }
    }
}

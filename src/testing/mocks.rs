//! Mock implementations for testing
//!
//! [`MockTransport`] plays the server: it hands out numbered sessions, can be
//! switched "down" and records everything it is sent. [`RecordingListener`]
//! and [`RecordingHandler`] capture what the connection reports back.

use crate::callback::UpdateHandler;
use crate::codec::qos::ACK_OK_QOS;
use crate::codec::{MsgUnit, RawMsgUnit};
use crate::connection::{ConnectionInfo, ConnectionState, ConnectionStateListener};
use crate::error::ClientResult;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory stand-in for the server
#[derive(Debug, Default)]
pub struct MockTransport {
    connects: AtomicUsize,
    pings: AtomicUsize,
    subscriptions: AtomicUsize,
    connect_failing: AtomicBool,
    ping_failing: AtomicBool,
    response_delay: Mutex<Option<Duration>>,
    connect_qos: Mutex<Vec<String>>,
    disconnected: Mutex<Vec<String>>,
    published: Mutex<Vec<RawMsgUnit>>,
    published_oneway: Mutex<Vec<RawMsgUnit>>,
    get_reply: Mutex<Vec<RawMsgUnit>>,
    remote_fault: Mutex<Option<TransportError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new sessions
    pub fn set_connect_failing(&self, failing: bool) {
        self.connect_failing.store(failing, Ordering::SeqCst);
    }

    /// Fail pings and every other call on an existing session
    pub fn set_ping_failing(&self, failing: bool) {
        self.ping_failing.store(failing, Ordering::SeqCst);
    }

    /// Server unreachable: both of the above
    pub fn set_server_down(&self, down: bool) {
        self.set_connect_failing(down);
        self.set_ping_failing(down);
    }

    /// Delay every reply, for timeout tests
    pub fn set_response_delay(&self, delay: Option<Duration>) {
        *self.response_delay.lock() = delay;
    }

    /// Make the next session call answer with a server exception
    pub fn fail_next_with(&self, fault: TransportError) {
        *self.remote_fault.lock() = Some(fault);
    }

    pub fn set_get_reply(&self, msgs: Vec<RawMsgUnit>) {
        *self.get_reply.lock() = msgs;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn connect_requests(&self) -> Vec<String> {
        self.connect_qos.lock().clone()
    }

    /// Session ids the server was asked to log out
    pub fn disconnected_sessions(&self) -> Vec<String> {
        self.disconnected.lock().clone()
    }

    pub fn published(&self) -> Vec<RawMsgUnit> {
        self.published.lock().clone()
    }

    pub fn published_oneway(&self) -> Vec<RawMsgUnit> {
        self.published_oneway.lock().clone()
    }

    async fn delay(&self) {
        let delay = *self.response_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn session_call(&self) -> Result<(), TransportError> {
        self.delay().await;
        if let Some(fault) = self.remote_fault.lock().take() {
            return Err(fault);
        }
        if self.ping_failing.load(Ordering::SeqCst) {
            return Err(TransportError::communication("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, connect_qos: &str) -> Result<String, TransportError> {
        self.delay().await;
        self.connect_qos.lock().push(connect_qos.to_string());
        if self.connect_failing.load(Ordering::SeqCst) {
            return Err(TransportError::communication("connection refused"));
        }
        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!(
            "<qos><session name='/node/heron/client/joe/session/{n}' sessionId='session-{n}'/></qos>"
        ))
    }

    async fn disconnect(&self, session_id: &str, _qos: &str) -> Result<bool, TransportError> {
        self.session_call().await?;
        self.disconnected.lock().push(session_id.to_string());
        Ok(true)
    }

    async fn ping(&self, _session_id: &str, _qos: &str) -> Result<String, TransportError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.session_call().await?;
        Ok(ACK_OK_QOS.to_string())
    }

    async fn publish(&self, _session_id: &str, msg: &RawMsgUnit) -> Result<String, TransportError> {
        self.session_call().await?;
        let oid = crate::codec::Key::decode(&msg.key)
            .map(|key| key.oid().to_string())
            .unwrap_or_default();
        self.published.lock().push(msg.clone());
        Ok(format!(
            "<qos><state id='OK'/><key oid='{}'/></qos>",
            crate::codec::escape::escape_attr(&oid)
        ))
    }

    async fn publish_oneway(
        &self,
        _session_id: &str,
        msgs: &[RawMsgUnit],
    ) -> Result<(), TransportError> {
        self.session_call().await?;
        self.published_oneway.lock().extend_from_slice(msgs);
        Ok(())
    }

    async fn subscribe(
        &self,
        _session_id: &str,
        _key: &str,
        _qos: &str,
    ) -> Result<String, TransportError> {
        self.session_call().await?;
        let n = self.subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!(
            "<qos><state id='OK'/><subscribe id='__subId:{n}'/></qos>"
        ))
    }

    async fn unsubscribe(
        &self,
        _session_id: &str,
        _key: &str,
        _qos: &str,
    ) -> Result<Vec<String>, TransportError> {
        self.session_call().await?;
        Ok(vec![ACK_OK_QOS.to_string()])
    }

    async fn erase(
        &self,
        _session_id: &str,
        _key: &str,
        _qos: &str,
    ) -> Result<Vec<String>, TransportError> {
        self.session_call().await?;
        Ok(vec![
            "<qos><state id='OK' info='ERASED'/></qos>".to_string(),
        ])
    }

    async fn get(
        &self,
        _session_id: &str,
        _key: &str,
        _qos: &str,
    ) -> Result<Vec<RawMsgUnit>, TransportError> {
        self.session_call().await?;
        Ok(self.get_reply.lock().clone())
    }
}

/// Records every state notification as `"OLD->NEW"`
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
    consumed_on_dead: Mutex<Vec<bool>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// For each DEAD notification, whether the connection was already consumed
    pub fn consumed_on_dead(&self) -> Vec<bool> {
        self.consumed_on_dead.lock().clone()
    }

    fn record(&self, old: ConnectionState, new: ConnectionState) {
        self.events.lock().push(format!("{old}->{new}"));
    }
}

impl ConnectionStateListener for RecordingListener {
    fn reached_alive(&self, old: ConnectionState, _connection: &dyn ConnectionInfo) {
        self.record(old, ConnectionState::Alive);
    }

    fn reached_polling(&self, old: ConnectionState, _connection: &dyn ConnectionInfo) {
        self.record(old, ConnectionState::Polling);
    }

    fn reached_dead(&self, old: ConnectionState, connection: &dyn ConnectionInfo) {
        self.record(old, ConnectionState::Dead);
        self.consumed_on_dead.lock().push(connection.is_consumed());
    }
}

/// Acknowledges every update and keeps it
#[derive(Debug, Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<(String, MsgUnit)>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<(String, MsgUnit)> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn update(&self, cb_session_id: &str, msg: MsgUnit) -> ClientResult<String> {
        self.received
            .lock()
            .push((cb_session_id.to_string(), msg));
        Ok(ACK_OK_QOS.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_hands_out_numbered_sessions() {
        let transport = MockTransport::new();

        let first = transport.connect("<qos/>").await.expect("up");
        let second = transport.connect("<qos/>").await.expect("up");

        assert!(first.contains("sessionId='session-1'"));
        assert!(second.contains("sessionId='session-2'"));
        assert_eq!(transport.connect_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_server_down() {
        let transport = MockTransport::new();
        transport.set_server_down(true);

        assert!(transport.connect("<qos/>").await.is_err());
        assert!(transport.ping("session-1", "<qos/>").await.is_err());
        assert_eq!(transport.connect_count(), 0);
        assert_eq!(transport.ping_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_fault_is_one_shot() {
        let transport = MockTransport::new();
        transport.fail_next_with(TransportError::remote_fault("user.security.authorization.notAuthorized", "no"));

        assert!(matches!(
            transport.ping("s", "<qos/>").await,
            Err(TransportError::RemoteFault { .. })
        ));
        assert!(transport.ping("s", "<qos/>").await.is_ok());
    }
}
